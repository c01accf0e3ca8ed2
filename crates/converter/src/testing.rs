//! Recording encoder double shared by pipeline and batch tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration};
use crate::error::{ConvertError, ConvertResult, Stage};
use crate::ffmpeg::{EncodeOutput, Encoder};

#[derive(Default)]
pub(crate) struct FakeEncoder {
    calls: Mutex<Vec<(Stage, Vec<String>)>>,
    /// (stage, substring of the input argument); `None` fails every input
    failures: Vec<(Stage, Option<String>)>,
    write_partial_on_failure: bool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, stage: Stage) -> Self {
        self.failures.push((stage, None));
        self
    }

    pub fn failing_for(mut self, stage: Stage, needle: &str) -> Self {
        self.failures.push((stage, Some(needle.to_string())));
        self
    }

    /// Leave a truncated output file behind when a stage fails
    pub fn with_partial_output(mut self) -> Self {
        self.write_partial_on_failure = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(Stage, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls().into_iter().map(|(stage, _)| stage).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, stage: Stage, input: &str) -> bool {
        self.failures.iter().any(|(s, needle)| {
            *s == stage && needle.as_deref().map_or(true, |n| input.contains(n))
        })
    }
}

fn input_arg(args: &[String]) -> String {
    args.windows(2)
        .find(|w| w[0] == "-i")
        .map(|w| w[1].clone())
        .unwrap_or_default()
}

impl Encoder for FakeEncoder {
    async fn encode(&self, stage: Stage, args: Vec<String>) -> ConvertResult<EncodeOutput> {
        self.calls.lock().unwrap().push((stage, args.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let output = PathBuf::from(args.last().cloned().unwrap_or_default());
        if self.should_fail(stage, &input_arg(&args)) {
            if self.write_partial_on_failure {
                std::fs::write(&output, b"partial").unwrap();
            }
            return Err(ConvertError::EncodeFailure {
                stage,
                reason: "exit code 1".to_string(),
            });
        }

        std::fs::write(&output, format!("{} output", stage)).unwrap();
        Ok(EncodeOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}
