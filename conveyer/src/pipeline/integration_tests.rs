//! End-to-end tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::channel::{Channel, UNDEFINED};
    use crate::context::Context;
    use crate::errors::{ConveyerError, StageError};
    use crate::events::{types, CollectingEventSink};
    use crate::pipeline::{Pipeline, PipelineBuilder, PipelineState, StageFuture};
    use crate::stages::{Decorator, Multiplexer, Separator};
    use crate::testing::{drain, send_all, spawn_run, FailingStage, RecordingStage};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    async fn wait_until_running(pipeline: &Pipeline) {
        while pipeline.state() != PipelineState::Running {
            tokio::task::yield_now().await;
        }
    }

    fn failing_now(
        reason: &'static str,
    ) -> impl Fn(Context, Arc<Channel>, Arc<Channel>) -> StageFuture + Send + Sync + 'static {
        move |_ctx: Context, _input: Arc<Channel>, _output: Arc<Channel>| -> StageFuture {
            Box::pin(async move { Err(StageError::msg(reason)) })
        }
    }

    #[tokio::test]
    async fn test_decorator_chain_is_idempotent() {
        let pipeline = Arc::new(
            PipelineBuilder::new()
                .prefix_decorator("in", "mid")
                .prefix_decorator("mid", "out")
                .build()
                .unwrap(),
        );
        let ctx = Context::background();
        let run = spawn_run(pipeline.clone(), ctx.clone());

        send_all(&pipeline, "in", ["a", "decorated: b"]).await.unwrap();
        assert_eq!(pipeline.recv("out").await.unwrap(), "decorated: a");
        assert_eq!(pipeline.recv("out").await.unwrap(), "decorated: b");

        ctx.cancel("done");
        run.await.unwrap().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Terminated);
    }

    #[tokio::test]
    async fn test_separator_round_robin_split() {
        let pipeline = Arc::new(Pipeline::new(4));
        pipeline
            .register_separator(Separator::new().into_stage(), "in", &["a", "b"])
            .unwrap();
        let ctx = Context::background();
        let run = spawn_run(pipeline.clone(), ctx.clone());

        send_all(&pipeline, "in", ["m1", "m2", "m3", "m4"]).await.unwrap();
        let a = vec![
            pipeline.recv("a").await.unwrap(),
            pipeline.recv("a").await.unwrap(),
        ];
        let b = vec![
            pipeline.recv("b").await.unwrap(),
            pipeline.recv("b").await.unwrap(),
        ];

        assert_eq!(a, vec!["m1", "m3"]);
        assert_eq!(b, vec!["m2", "m4"]);

        ctx.cancel("done");
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_multiplexer_merges_and_skips() {
        let pipeline = Arc::new(Pipeline::new(4));
        pipeline
            .register_multiplexer(Multiplexer::default().into_stage(), &["x", "y"], "out")
            .unwrap();
        let ctx = Context::background();
        let run = spawn_run(pipeline.clone(), ctx.clone());

        send_all(&pipeline, "x", ["x1", "no multiplexer", "x2"]).await.unwrap();
        send_all(&pipeline, "y", ["y1"]).await.unwrap();

        let mut merged = Vec::new();
        for _ in 0..3 {
            merged.push(pipeline.recv("out").await.unwrap());
        }
        let from_x: Vec<_> = merged.iter().filter(|m| m.starts_with('x')).cloned().collect();
        assert_eq!(from_x, vec!["x1", "x2"]);
        merged.sort();
        assert_eq!(merged, vec!["x1", "x2", "y1"]);

        ctx.cancel("done");
        run.await.unwrap().unwrap();
        assert_eq!(pipeline.recv("out").await.unwrap(), UNDEFINED);
    }

    #[tokio::test]
    async fn test_poison_fails_run_and_closes_channels() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = Pipeline::new(4).with_event_sink(sink.clone());
        pipeline
            .register_decorator(Decorator::default().into_stage(), "in", "out")
            .unwrap();

        send_all(&pipeline, "in", ["ok", "no decorator"]).await.unwrap();
        let err = pipeline.run(&Context::background()).await.unwrap_err();

        assert!(matches!(
            err.stage_error(),
            Some(StageError::CantBeDecorated { message }) if message == "no decorator"
        ));
        assert_eq!(drain(&pipeline, "out").await.unwrap(), vec!["decorated: ok"]);
        assert!(matches!(
            pipeline.send("in", "late").await,
            Err(ConveyerError::ChannelClosed(_))
        ));
        assert_eq!(sink.events_of_type(types::CHANNEL_CLOSED).len(), 2);
        assert_eq!(sink.events_of_type(types::STAGE_FAILED).len(), 1);
    }

    #[tokio::test]
    async fn test_first_error_cancels_siblings() {
        let recorder = RecordingStage::new();
        let pipeline = Pipeline::new(4);
        pipeline
            .register_decorator(recorder.stage(), "idle-in", "idle-out")
            .unwrap();
        pipeline
            .register_decorator(FailingStage::new("broken").into_stage(), "in", "out")
            .unwrap();

        pipeline.send("in", "trigger").await.unwrap();
        let err = pipeline.run(&Context::background()).await.unwrap_err();

        assert_eq!(err.stage_error().map(ToString::to_string).as_deref(), Some("broken"));
        assert!(recorder.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_later_errors_are_discarded() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = Pipeline::new(1).with_event_sink(sink.clone());
        pipeline.register_decorator(failing_now("first"), "a", "b").unwrap();
        pipeline.register_decorator(failing_now("second"), "c", "d").unwrap();

        let err = pipeline.run(&Context::background()).await.unwrap_err();
        let reason = err.stage_error().map(ToString::to_string).unwrap();

        assert!(reason == "first" || reason == "second");
        assert_eq!(sink.events_of_type(types::STAGE_FAILED).len(), 2);
        assert_eq!(sink.events_of_type(types::STAGE_ERROR_DISCARDED).len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_stage_becomes_error() {
        let pipeline = Pipeline::new(1);
        pipeline
            .register_decorator(
                |_ctx: Context, _input: Arc<Channel>, _output: Arc<Channel>| -> StageFuture {
                    Box::pin(async move {
                        if true {
                            panic!("stage blew up");
                        }
                        Ok(())
                    })
                },
                "in",
                "out",
            )
            .unwrap();

        let err = pipeline.run(&Context::background()).await.unwrap_err();

        assert!(matches!(err.stage_error(), Some(StageError::Panicked(_))));
        assert_eq!(pipeline.recv("out").await.unwrap(), UNDEFINED);
    }

    #[tokio::test]
    async fn test_panic_after_idle_stage_still_shuts_down() {
        let pipeline = Pipeline::new(1);
        pipeline
            .register_decorator(Decorator::default().into_stage(), "idle-in", "idle-out")
            .unwrap();
        pipeline
            .register_decorator(
                |_ctx: Context, _input: Arc<Channel>, _output: Arc<Channel>| -> StageFuture {
                    Box::pin(async move {
                        if true {
                            panic!("second stage blew up");
                        }
                        Ok(())
                    })
                },
                "in",
                "out",
            )
            .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            pipeline.run(&Context::background()),
        )
        .await
        .expect("run must return after a stage panics");

        let err = result.unwrap_err();
        assert!(matches!(
            err.stage_error(),
            Some(StageError::Panicked(ref m)) if m == "second stage blew up"
        ));
        assert_eq!(pipeline.recv("idle-out").await.unwrap(), UNDEFINED);
        assert_eq!(pipeline.state(), PipelineState::Terminated);
    }

    #[tokio::test]
    async fn test_run_through_derived_context_is_cancellable() {
        let pipeline = Arc::new(
            PipelineBuilder::new()
                .prefix_decorator("in", "out")
                .build()
                .unwrap(),
        );
        let root = Context::background();
        let run = spawn_run(
            pipeline.clone(),
            root.child().with_timeout(Duration::from_secs(60)),
        );
        wait_until_running(&pipeline).await;

        root.cancel("caller shutdown");
        let result = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("cancelling the root must stop the run");

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let pipeline = Arc::new(
            PipelineBuilder::new()
                .prefix_decorator("in", "out")
                .build()
                .unwrap(),
        );
        let ctx = Context::background();
        let run = spawn_run(pipeline.clone(), ctx.clone());
        wait_until_running(&pipeline).await;

        assert!(matches!(
            pipeline.run(&Context::background()).await,
            Err(ConveyerError::AlreadyRunning)
        ));

        pipeline.send("in", "still works").await.unwrap();
        assert_eq!(pipeline.recv("out").await.unwrap(), "decorated: still works");

        ctx.cancel("done");
        run.await.unwrap().unwrap();
        assert!(matches!(
            pipeline.run(&Context::background()).await,
            Err(ConveyerError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn test_caller_timeout_stops_run_cleanly() {
        let pipeline = PipelineBuilder::new()
            .prefix_decorator("in", "out")
            .build()
            .unwrap();
        let ctx = Context::background().with_timeout(Duration::from_millis(20));

        let result = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&ctx)).await;

        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(pipeline.state(), PipelineState::Terminated);
        assert_eq!(pipeline.recv("in").await.unwrap(), UNDEFINED);
    }

    #[tokio::test]
    async fn test_aliased_channel_is_closed_once() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = Arc::new(
            PipelineBuilder::new()
                .event_sink(sink.clone())
                .prefix_decorator("in", "out")
                .alias("result", "out")
                .build()
                .unwrap(),
        );
        let ctx = Context::background();
        let run = spawn_run(pipeline.clone(), ctx.clone());

        pipeline.send("in", "x").await.unwrap();
        assert_eq!(pipeline.recv("result").await.unwrap(), "decorated: x");

        ctx.cancel("done");
        run.await.unwrap().unwrap();

        assert_eq!(sink.events_of_type(types::CHANNEL_CLOSED).len(), 2);
        assert_eq!(pipeline.recv("result").await.unwrap(), UNDEFINED);
    }

    #[tokio::test]
    async fn test_full_topology_emits_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = Arc::new(
            PipelineBuilder::new()
                .buffer_size(2)
                .event_sink(sink.clone())
                .prefix_decorator("in", "decorated")
                .round_robin_separator("decorated", &["left", "right"])
                .skipping_multiplexer(&["left", "right"], "out")
                .build()
                .unwrap(),
        );
        let ctx = Context::background();
        let run = spawn_run(pipeline.clone(), ctx.clone());

        let producer = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { send_all(&pipeline, "in", ["1", "2", "3", "4"]).await })
        };
        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(pipeline.recv("out").await.unwrap());
        }
        producer.await.unwrap().unwrap();
        received.sort();

        assert_eq!(
            received,
            vec!["decorated: 1", "decorated: 2", "decorated: 3", "decorated: 4"]
        );

        ctx.cancel("done");
        run.await.unwrap().unwrap();

        assert_eq!(sink.events_of_type(types::PIPELINE_STARTED).len(), 1);
        assert_eq!(sink.events_of_type(types::STAGE_STARTED).len(), 3);
        assert_eq!(sink.events_of_type(types::STAGE_COMPLETED).len(), 3);
        assert_eq!(sink.events_of_type(types::CHANNEL_CLOSED).len(), 5);
        let completed = sink.events_of_type(types::PIPELINE_COMPLETED);
        assert_eq!(completed[0].1.as_ref().unwrap()["success"], true);
    }
}
