use crate::helpers::{
    init_tracing, numbered_inputs, CancellingStage, FailingFinishStage, FailingStage,
    PanickingStage, PassthroughStage, RecordingStage, SlowStage,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use strata::{Pipeline, PipelineError, Stage, StageError};
use tokio::sync::broadcast;

#[cfg(test)]
mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn it_should_report_the_failing_stage_and_stop_every_worker() {
        // Given
        init_tracing();
        let failing = Arc::new(FailingStage::new(7, 4));
        let downstream = RecordingStage {
            name: "downstream",
            ..RecordingStage::default()
        };
        let graph = Pipeline::new()
            .stage(PassthroughStage { workers: 2 })
            .shared_stage(Arc::clone(&failing) as Arc<dyn Stage>)
            .stage(downstream.clone())
            .build()
            .unwrap();

        // When
        let result = graph.run(numbered_inputs(1_000)).await;

        // Then
        assert_eq!(
            result.unwrap_err(),
            PipelineError::Stage {
                stage: "Failing".to_string(),
                source: StageError::fatal("failed on call 7"),
            }
        );
        assert_eq!(downstream.finished.load(Ordering::SeqCst), 0);

        let calls = failing.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(failing.calls.load(Ordering::SeqCst), calls);
        assert!(calls < 1_000);

        drop(graph);
        assert_eq!(Arc::strong_count(&failing), 1);
    }

    #[tokio::test]
    async fn it_should_cancel_when_a_stage_signals_through_its_context() {
        // Given
        let graph = Pipeline::new()
            .stage(CancellingStage)
            .stage(PassthroughStage { workers: 1 })
            .build()
            .unwrap();

        // When
        let result = graph.run(numbered_inputs(3)).await;

        // Then
        assert_eq!(
            result.unwrap_err().to_string(),
            "stage 'Cancelling' failed: giving up"
        );
        assert!(!graph.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn it_should_time_out_slow_calls() {
        // Given
        let graph = Pipeline::new()
            .stage(SlowStage {
                delay: Duration::from_secs(30),
                deadline: Some(Duration::from_millis(20)),
            })
            .build()
            .unwrap();

        // When
        let result = graph.run(numbered_inputs(1)).await;

        // Then
        assert_eq!(
            result.unwrap_err(),
            PipelineError::Timeout {
                stage: "Slow".to_string(),
                after: Duration::from_millis(20),
            }
        );
    }

    #[tokio::test]
    async fn it_should_apply_the_pipeline_default_deadline() {
        // Given
        let graph = Pipeline::new()
            .stage(SlowStage {
                delay: Duration::from_secs(30),
                deadline: None,
            })
            .stage_timeout(Duration::from_millis(10))
            .build()
            .unwrap();

        // When
        let result = graph.run(numbered_inputs(2)).await;

        // Then
        assert!(matches!(result, Err(PipelineError::Timeout { .. })));
    }

    #[tokio::test]
    async fn it_should_turn_a_panic_into_a_cancellation() {
        // Given
        let graph = Pipeline::new()
            .stage(PanickingStage)
            .build()
            .unwrap();

        // When
        let result = graph.run(numbered_inputs(1)).await;

        // Then
        assert_eq!(
            result.unwrap_err(),
            PipelineError::Panicked {
                stage: "Panicking".to_string(),
                message: "stage exploded".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn it_should_fail_the_run_when_finish_fails() {
        // Given
        let downstream = RecordingStage::default();
        let graph = Pipeline::new()
            .stage(FailingFinishStage)
            .stage(downstream.clone())
            .build()
            .unwrap();

        // When
        let result = graph.run(numbered_inputs(5)).await;

        // Then
        assert_eq!(
            result.unwrap_err().to_string(),
            "stage 'FailingFinish' failed: flush failed"
        );
        assert_eq!(downstream.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn it_should_stop_on_external_shutdown() {
        // Given
        let graph = Pipeline::new()
            .stage(PassthroughStage { workers: 2 })
            .build()
            .unwrap();
        let (input_tx, input_rx) = flume::unbounded();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        for payload in numbered_inputs(5) {
            input_tx.send(payload).unwrap();
        }

        // When
        let handle = tokio::spawn(async move { graph.run_stream(input_rx, shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        let result = handle.await.unwrap();

        // Then
        assert_eq!(result.unwrap_err(), PipelineError::Shutdown);
        drop(input_tx);
    }

    #[tokio::test]
    async fn it_should_stop_when_cancelled_from_outside() {
        // Given
        let graph = Pipeline::new()
            .stage(SlowStage {
                delay: Duration::from_millis(5),
                deadline: None,
            })
            .build()
            .unwrap();
        let cancellation = graph.cancellation();

        // When
        let handle = tokio::spawn(async move { graph.run(numbered_inputs(10_000)).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancellation.cancel(PipelineError::Shutdown);
        let result = handle.await.unwrap();

        // Then
        assert_eq!(result.unwrap_err(), PipelineError::Shutdown);
    }

    #[tokio::test]
    async fn it_should_not_launch_work_after_cancellation() {
        // Given
        let recorder = RecordingStage::default();
        let graph = Pipeline::new().stage(recorder.clone()).build().unwrap();
        graph
            .cancellation()
            .cancel(PipelineError::Shutdown);

        // When
        let result = graph.run(numbered_inputs(3)).await;

        // Then
        assert_eq!(result.unwrap_err(), PipelineError::Shutdown);
        assert_eq!(recorder.processed.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 0);
    }
}
