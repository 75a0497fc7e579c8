//! 외부 명령 폴링 소스
//!
//! 폴링마다 설정된 명령을 실행하고 stdout 라인을 반환합니다.
//! 주로 `kubectl logs ... --since=10s`처럼 "최근 N초" 창을 가진 원격 tail 명령을 사용하며,
//! 연속된 폴링 사이에 겹치는 라인은 수집 루프의 중복 제거가 흡수합니다.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use wafscope_core::pipeline::BoxFuture;

use super::LogSource;
use crate::error::LogPipelineError;

const SOURCE_TYPE: &str = "command";

/// 에러 메시지에 포함할 stderr 최대 길이
const MAX_STDERR_IN_ERROR: usize = 256;

/// 외부 명령 폴링 소스
pub struct CommandTailSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    name: String,
}

impl CommandTailSource {
    /// `command[0]`을 프로그램, 나머지를 인자로 하는 소스를 생성합니다.
    pub fn new(command: &[String], timeout: Duration) -> Result<Self, LogPipelineError> {
        let (program, args) = command
            .split_first()
            .filter(|(program, _)| !program.is_empty())
            .ok_or_else(|| LogPipelineError::Config {
                field: "command".to_owned(),
                reason: "command must name a program".to_owned(),
            })?;

        Ok(Self {
            name: format!("command:{program}"),
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    async fn run_once(&self) -> Result<Vec<String>, LogPipelineError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                LogPipelineError::unavailable(
                    SOURCE_TYPE,
                    format!("{} timed out after {:?}", self.program, self.timeout),
                )
            })?
            .map_err(|e| {
                LogPipelineError::unavailable(
                    SOURCE_TYPE,
                    format!("failed to run {}: {e}", self.program),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(MAX_STDERR_IN_ERROR).collect();
            return Err(LogPipelineError::unavailable(
                SOURCE_TYPE,
                format!("{} exited with {}: {stderr}", self.program, output.status),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }
}

impl LogSource for CommandTailSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> BoxFuture<'_, Result<Vec<String>, LogPipelineError>> {
        Box::pin(self.run_once())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn rejects_empty_command() {
        assert!(CommandTailSource::new(&[], Duration::from_secs(1)).is_err());
        assert!(CommandTailSource::new(&cmd(&[""]), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn name_includes_program() {
        let source =
            CommandTailSource::new(&cmd(&["kubectl", "logs"]), Duration::from_secs(1)).unwrap();
        assert_eq!(source.name(), "command:kubectl");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn returns_stdout_lines() {
        let mut source = CommandTailSource::new(
            &cmd(&["sh", "-c", "printf 'first\\n\\nsecond\\n'"]),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(source.poll().await.unwrap(), vec!["first", "second"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_unavailable() {
        let mut source = CommandTailSource::new(
            &cmd(&["sh", "-c", "echo boom >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = source.poll().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let mut source = CommandTailSource::new(
            &cmd(&["wafscope-definitely-not-a-program"]),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(matches!(
            source.poll().await,
            Err(LogPipelineError::SourceUnavailable { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let mut source =
            CommandTailSource::new(&cmd(&["sleep", "5"]), Duration::from_millis(100)).unwrap();
        let err = source.poll().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
