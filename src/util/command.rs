use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{ColvaultError, Result};

pub fn describe_command(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run `producer | consumer` and return both exit codes.
pub fn run_pipeline(producer: &mut Command, consumer: &mut Command) -> Result<(i32, i32)> {
    debug!(
        command = %format!("{} | {}", describe_command(producer), describe_command(consumer)),
        "exec"
    );
    let mut first = producer
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| ColvaultError::message(format!("{}: {}", producer.get_program().to_string_lossy(), e)))?;
    let Some(stdout) = first.stdout.take() else {
        let _ = first.kill();
        let _ = first.wait();
        return Err(ColvaultError::message("pipeline stdout unavailable"));
    };
    let second = consumer.stdin(Stdio::from(stdout)).spawn();
    let mut second = match second {
        Ok(child) => child,
        Err(e) => {
            let _ = first.kill();
            let _ = first.wait();
            return Err(ColvaultError::message(format!(
                "{}: {}",
                consumer.get_program().to_string_lossy(),
                e
            )));
        }
    };
    let first_status = first.wait()?;
    let second_status = second.wait()?;
    Ok((
        first_status.code().unwrap_or(1),
        second_status.code().unwrap_or(1),
    ))
}
