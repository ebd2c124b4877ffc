use std::process::{Command, Output};

/// Installed ImageMagick flavour. Version 7 ships a single `magick` driver,
/// version 6 installs `convert` and `identify` as separate programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMagick {
    V7,
    V6,
}

impl ImageMagick {
    /// Detect the installed ImageMagick, preferring v7
    pub fn detect() -> Option<Self> {
        if responds_to_version("magick") {
            Some(ImageMagick::V7)
        } else if responds_to_version("convert") {
            Some(ImageMagick::V6)
        } else {
            None
        }
    }

    /// Program name used for raster operations
    pub fn convert_program(&self) -> &'static str {
        match self {
            ImageMagick::V7 => "magick",
            ImageMagick::V6 => "convert",
        }
    }

    /// Program name used for metadata queries
    pub fn identify_program(&self) -> &'static str {
        match self {
            ImageMagick::V7 => "magick identify",
            ImageMagick::V6 => "identify",
        }
    }

    pub fn convert(&self) -> Command {
        Command::new(self.convert_program())
    }

    pub fn identify(&self) -> Command {
        match self {
            ImageMagick::V7 => {
                let mut command = Command::new("magick");
                command.arg("identify");
                command
            }
            ImageMagick::V6 => Command::new("identify"),
        }
    }
}

fn responds_to_version(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Exit code of a finished tool, `-1` when it was killed by a signal
pub fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

/// Captured diagnostic text of a finished tool
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
