//! Generates the batch script that finishes an update after we've exited.
//!
//! We can't overwrite our own image while it's mapped, so the copy has to be
//! done by someone who outlives us. That someone is cmd.exe running this
//! script: it waits a moment for our handles to go away, copies the payload
//! over the install dir, cleans up the payload, starts the new build and
//! deletes itself.
use crate::error::ScriptError;
use std::fs;
use std::path::{Path, PathBuf};

pub const SCRIPT_NAME: &str = "update_script.bat";

const HEADER: [&str; 2] = ["@echo off", "chcp 65001 > NUL"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    Pause { seconds: u32 },
    CopyTree { from: String, to: String },
    RemoveTree { path: String },
    Launch { executable: String },
    DeleteSelf,
    Exit,
}

/// Paths go into the script inside double quotes. Windows paths can't contain
/// quotes or line breaks anyway, so anything that does is refused. `%` is the
/// one character cmd still expands inside quotes.
fn escape(path: &str) -> String {
    path.replace('%', "%%")
}

fn unescape(text: &str) -> String {
    text.replace("%%", "%")
}

fn checked_path(path: &Path) -> Result<String, ScriptError> {
    let text = path
        .to_str()
        .ok_or_else(|| ScriptError::NonUnicodePath(path.to_path_buf()))?;
    if text.is_empty() || text.contains(['"', '\r', '\n', '\0']) {
        return Err(ScriptError::UnsafePath(text.to_owned()));
    }
    Ok(text.to_owned())
}

/// `C:\dir\` and `C:\dir` should both end up as `C:\dir\*`, never `C:\dir\\*`.
fn without_trailing_separator(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['\\', '/']);
    if trimmed.is_empty() {
        path
    } else {
        trimmed
    }
}

impl ScriptOp {
    pub fn render(&self) -> String {
        match self {
            ScriptOp::Pause { seconds } => format!("timeout /t {seconds} /nobreak > NUL"),
            ScriptOp::CopyTree { from, to } => format!(
                "xcopy /E /I /Y \"{}\\*\" \"{}\\\"",
                escape(without_trailing_separator(from)),
                escape(without_trailing_separator(to))
            ),
            ScriptOp::RemoveTree { path } => format!("rmdir /S /Q \"{}\"", escape(path)),
            ScriptOp::Launch { executable } => format!("start \"\" \"{}\"", escape(executable)),
            ScriptOp::DeleteSelf => "del \"%~f0\"".to_owned(),
            ScriptOp::Exit => "exit".to_owned(),
        }
    }

    /// Inverse of `render`. Lines that aren't operations (the header, blank
    /// lines) give `None`.
    pub fn parse_line(line: &str) -> Option<ScriptOp> {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("timeout /t ") {
            let seconds = rest.strip_suffix(" /nobreak > NUL")?.parse().ok()?;
            return Some(ScriptOp::Pause { seconds });
        }
        if let Some(rest) = line.strip_prefix("xcopy /E /I /Y \"") {
            let (from, to) = rest.strip_suffix("\\\"")?.split_once("\\*\" \"")?;
            return Some(ScriptOp::CopyTree {
                from: unescape(from),
                to: unescape(to),
            });
        }
        if let Some(rest) = line.strip_prefix("rmdir /S /Q \"") {
            return Some(ScriptOp::RemoveTree {
                path: unescape(rest.strip_suffix('"')?),
            });
        }
        if let Some(rest) = line.strip_prefix("start \"\" \"") {
            return Some(ScriptOp::Launch {
                executable: unescape(rest.strip_suffix('"')?),
            });
        }
        match line {
            "del \"%~f0\"" => Some(ScriptOp::DeleteSelf),
            "exit" => Some(ScriptOp::Exit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementScript {
    ops: Vec<ScriptOp>,
}

impl ReplacementScript {
    pub fn operations(&self) -> &[ScriptOp] {
        &self.ops
    }

    pub fn render(&self) -> String {
        HEADER
            .iter()
            .map(|line| line.to_string())
            .chain(self.ops.iter().map(ScriptOp::render))
            .map(|line| line + "\r\n")
            .collect()
    }

    pub fn parse(text: &str) -> ReplacementScript {
        ReplacementScript {
            ops: text.lines().filter_map(ScriptOp::parse_line).collect(),
        }
    }

    /// Write the script as `update_script.bat` in `dir`, replacing any
    /// leftover from an earlier run.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ScriptError> {
        let path = dir.join(SCRIPT_NAME);
        fs::write(&path, self.render()).map_err(|source| ScriptError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Build the replacement script.
///
/// * `update_dir`: the new files.
/// * `dest_dir`: the install root they're copied over.
/// * `executable_path`: what to start once the copy is done.
/// * `staging_dir`: the per-download holding area `update_dir` lives in, if
///   any. That whole area is removed afterwards; otherwise `update_dir` is.
pub fn emit(
    update_dir: &Path,
    dest_dir: &Path,
    executable_path: &Path,
    staging_dir: Option<&Path>,
) -> Result<ReplacementScript, ScriptError> {
    let update = without_trailing_separator(&checked_path(update_dir)?).to_owned();
    let dest = without_trailing_separator(&checked_path(dest_dir)?).to_owned();
    let executable = checked_path(executable_path)?;
    let cleanup = match staging_dir {
        Some(staging) => checked_path(staging)?,
        None => update.clone(),
    };

    Ok(ReplacementScript {
        ops: vec![
            ScriptOp::Pause { seconds: 2 },
            ScriptOp::CopyTree {
                from: update,
                to: dest,
            },
            ScriptOp::RemoveTree { path: cleanup },
            ScriptOp::Pause { seconds: 1 },
            ScriptOp::Launch { executable },
            ScriptOp::Pause { seconds: 1 },
            ScriptOp::DeleteSelf,
            ScriptOp::Exit,
        ],
    })
}
