use crate::api::{ImagePublisher, StatusSink};
use crate::error::{Result, Severity};
use crate::types::{ImagePushOutcome, StatusLine};
use tracing::{info, warn};

/// Best-effort image push
///
/// Push failures (`Severity::NonFatal`) are reported and swallowed. Anything
/// fatal the publisher surfaces, such as a configuration error, is returned.
pub async fn publish_image(
    images: &dyn ImagePublisher,
    repository: &str,
    tag: &str,
    status: &dyn StatusSink,
) -> Result<ImagePushOutcome> {
    match images.push_image(repository, tag).await {
        Ok(outcome) => {
            if let ImagePushOutcome::Pushed { digest } = &outcome {
                info!(repository, tag, digest = %digest, "image pushed");
            }
            Ok(outcome)
        }
        Err(e) if e.severity() == Severity::NonFatal => {
            warn!(repository, tag, error = %e, "image push failed, continuing");
            let message = e.to_string();
            status.status(&StatusLine::ImagePushFailed {
                message: message.clone(),
            });
            Ok(ImagePushOutcome::Failed { message })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FailingPublisher(fn() -> ProvisionError);

    #[async_trait]
    impl ImagePublisher for FailingPublisher {
        async fn push_image(&self, _repository: &str, _tag: &str) -> Result<ImagePushOutcome> {
            Err((self.0)())
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl StatusSink for Lines {
        fn status(&self, line: &StatusLine) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn push_failure_is_reported_and_swallowed() {
        let publisher = FailingPublisher(|| ProvisionError::image_push("manifest invalid"));
        let lines = Lines::default();

        let outcome = publish_image(&publisher, "skodaice", "latest", &lines)
            .await
            .unwrap();

        assert!(matches!(outcome, ImagePushOutcome::Failed { .. }));
        assert_eq!(lines.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fatal_publisher_error_is_returned() {
        let publisher = FailingPublisher(|| ProvisionError::connect("no registry credentials"));
        let lines = Lines::default();

        let err = publish_image(&publisher, "skodaice", "latest", &lines)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(lines.0.lock().unwrap().is_empty());
    }
}
