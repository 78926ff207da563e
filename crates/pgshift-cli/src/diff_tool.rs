//! External schema diff and dump tools, run as child processes.
//!
//! Both are opaque to the engine: stdout is the script, a non-zero exit is
//! a transient failure with the tool's stderr attached.

use async_trait::async_trait;
use pgshift::client::run_cancellable;
use pgshift::{CancellationToken, SchemaDiffer, SchemaDumper, ShiftError, ShiftResult};
use tokio::process::Command;

pub struct CommandDiffer {
    /// Command template; `{source}`, `{target}`, and `{schemas}` are
    /// substituted per invocation.
    pub template: Vec<String>,
}

pub struct CommandDumper {
    /// Command template; `{conn}` is substituted per invocation.
    pub template: Vec<String>,
}

async fn run_capture(args: Vec<String>) -> ShiftResult<String> {
    let Some((program, rest)) = args.split_first() else {
        return Err(ShiftError::not_found("external command not configured"));
    };
    let output = Command::new(program)
        .args(rest)
        .output()
        .await
        .map_err(|e| ShiftError::Transient(format!("failed to run {program}: {e}")))?;
    if !output.status.success() {
        return Err(ShiftError::Transient(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn substitute(template: &[String], pairs: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            let mut arg = arg.clone();
            for (key, value) in pairs {
                arg = arg.replace(key, value);
            }
            arg
        })
        .collect()
}

#[async_trait]
impl SchemaDiffer for CommandDiffer {
    async fn diff(
        &self,
        token: &CancellationToken,
        source: &str,
        target: &str,
        schemas: &[String],
    ) -> ShiftResult<String> {
        let schemas = schemas.join(",");
        let args = substitute(
            &self.template,
            &[
                ("{source}", source),
                ("{target}", target),
                ("{schemas}", &schemas),
            ],
        );
        run_cancellable(token, run_capture(args)).await
    }
}

#[async_trait]
impl SchemaDumper for CommandDumper {
    async fn dump(&self, token: &CancellationToken, conn_string: &str) -> ShiftResult<String> {
        let args = substitute(&self.template, &[("{conn}", conn_string)]);
        run_cancellable(token, run_capture(args)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholders() {
        let template = vec![
            "migra".to_string(),
            "{source}".to_string(),
            "{target}".to_string(),
        ];
        let args = substitute(&template, &[("{source}", "postgres://a"), ("{target}", "postgres://b")]);
        assert_eq!(args, vec!["migra", "postgres://a", "postgres://b"]);
    }

    #[tokio::test]
    async fn empty_template_is_an_error() {
        let err = run_capture(Vec::new()).await.expect_err("must fail");
        assert!(err.is_not_found());
    }
}
