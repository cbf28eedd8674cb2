//! Tool implementations that run external processes.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use tracing::debug;
use tracing::warn;

use crate::config::StatsCommand;
use crate::tools::ConvertRequest;
use crate::tools::CopyRequest;
use crate::tools::Demultiplexer;
use crate::tools::ExitCode;
use crate::tools::StatsReport;
use crate::tools::StatsTool;
use crate::tools::Transfer;

/// Runs a command to completion, reporting its standard error on failure.
fn run(mut command: Command) -> io::Result<ExitCode> {
    debug!("running {command:?}");

    let output = command.stderr(Stdio::piped()).output()?;
    let exit = ExitCode::from(output.status);

    if !exit.success() {
        let program = command.get_program().to_string_lossy().to_string();
        warn!("`{program}` exited with code {exit}");

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!("  ↳ {program}: {line}");
        }
    }

    Ok(exit)
}

/// The `bcl-convert` demultiplexer.
#[derive(Clone, Debug)]
pub struct BclConvert {
    /// The program.
    program: String,
    /// Extra arguments.
    args: Vec<String>,
}

impl BclConvert {
    /// Creates a `bcl-convert` invoker.
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }

    /// Builds the command for a request.
    fn command(&self, request: &ConvertRequest<'_>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--bcl-input-directory")
            .arg(request.input)
            .arg("--output-directory")
            .arg(request.output)
            .arg("--sample-sheet")
            .arg(request.sample_sheet);

        if request.first_tile_only {
            command.arg("--first-tile-only").arg("true");
        }

        command.args(&self.args).stdout(Stdio::null());
        command
    }
}

impl Demultiplexer for BclConvert {
    fn convert(&self, request: &ConvertRequest<'_>) -> io::Result<ExitCode> {
        run(self.command(request))
    }
}

/// The InterOp statistics commands.
#[derive(Clone, Debug)]
pub struct InterOp {
    /// The commands, run in order.
    commands: Vec<StatsCommand>,
}

impl InterOp {
    /// Creates an InterOp invoker.
    pub fn new(commands: Vec<StatsCommand>) -> Self {
        Self { commands }
    }
}

impl StatsTool for InterOp {
    fn generate(&self, run_dir: &Path, output_dir: &Path) -> io::Result<Vec<StatsReport>> {
        let mut reports = Vec::with_capacity(self.commands.len());

        for stats in &self.commands {
            let path = output_dir.join(&stats.output);

            let mut command = Command::new(&stats.program);
            command
                .args(&stats.args)
                .arg(run_dir)
                .stdout(Stdio::from(File::create(&path)?));

            // A missing program is a failed report, not a reason to skip the
            // remaining commands.
            let exit = match run(command) {
                Ok(exit) => exit,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!("`{}` could not be found", stats.program);
                    ExitCode::new(127)
                }
                Err(err) => return Err(err),
            };

            reports.push(StatsReport {
                name: stats.name.clone(),
                path,
                exit,
            });
        }

        Ok(reports)
    }
}

/// A copy primitive backed by a program that accepts `--exclude=<glob>`
/// filters followed by sources and a destination (for example, `rsync` or
/// `rclone`).
#[derive(Clone, Debug)]
pub struct CommandTransfer {
    /// The program.
    program: String,
    /// Arguments preceding the filters.
    args: Vec<String>,
}

impl CommandTransfer {
    /// Creates a copy primitive.
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }

    /// Builds the command for a request.
    fn command(&self, request: &CopyRequest) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        for pattern in &request.excludes {
            command.arg(format!("--exclude={pattern}"));
        }

        command
            .args(&request.sources)
            .arg(&request.destination)
            .stdout(Stdio::null());
        command
    }
}

impl Transfer for CommandTransfer {
    fn copy(&self, request: &CopyRequest) -> io::Result<ExitCode> {
        run(self.command(request))
    }
}
