use anyhow::Result;
use debugkit_handlers::{
    ExceptionHandler, LogHandler, MemoryHandler, MessageHandler, QueryHandler, QueryProfiler,
    RequestHandler, RequestSnapshot, RuntimeHandler, TimeHandler,
};
use debugkit_testing::RecordingLogger;
use debugkit_testing::assertions::assert_logged_at;
use debugkit_types::{Error, Handler, Level, LoggingParams};
use serde_json::json;
use std::sync::Arc;

fn every_handler() -> Vec<Box<dyn Handler>> {
    vec![
        Box::new(ExceptionHandler::new()),
        Box::new(LogHandler::new()),
        Box::new(MemoryHandler::new()),
        Box::new(MessageHandler::new()),
        Box::new(QueryHandler::new(Arc::new(QueryProfiler::new()))),
        Box::new(RequestHandler::new(RequestSnapshot::new("GET", "/"))),
        Box::new(RuntimeHandler::new()),
        Box::new(TimeHandler::new()),
    ]
}

#[test]
fn test_logger_without_level_is_rejected_by_every_handler() {
    for mut handler in every_handler() {
        let logger = RecordingLogger::new();
        handler.set_logger(logger.shared());
        handler.set_logging_params(LoggingParams::default());

        let handler_type = handler.handler_type();
        match handler.log() {
            Err(Error::MissingLogLevel(reported)) => assert_eq!(reported, handler_type),
            other => panic!("{}: expected MissingLogLevel, got {:?}", handler_type, other),
        }
        assert!(logger.is_empty(), "{} logged despite the error", handler_type);
    }
}

#[test]
fn test_no_logger_means_no_op() -> Result<()> {
    for mut handler in every_handler() {
        handler.log()?;
    }
    Ok(())
}

#[test]
fn test_message_handler_logs_each_message_at_configured_level() -> Result<()> {
    let logger = RecordingLogger::new();
    let mut handler =
        MessageHandler::new().with_logger(logger.shared(), LoggingParams::new(Level::Info));
    handler.add_message_at("first", 1.5).add_message_at("second", 2.5);

    handler.log()?;

    assert_logged_at(&logger, Level::Info)?;
    assert_eq!(logger.messages(), vec!["first", "second"]);
    assert_eq!(
        logger.records()[1].context,
        json!({"message": "second", "timestamp": 2.5})
    );
    Ok(())
}

#[test]
fn test_time_handler_respects_limit() -> Result<()> {
    let logger = RecordingLogger::new();
    let mut handler = TimeHandler::started_at(1.0).with_logger(
        logger.shared(),
        LoggingParams::new(Level::Warning).with_limit(2.0),
    );
    handler.stop(Some(3.5));

    handler.log()?;

    assert_logged_at(&logger, Level::Warning)?;
    assert_eq!(
        logger.messages(),
        vec!["Elapsed time limit of 2 second(s) has been exceeded by 0.50000 second(s)"]
    );

    logger.clear();
    handler.set_logging_params(LoggingParams::new(Level::Warning).with_limit(5.0));
    handler.log()?;
    assert!(logger.is_empty());
    Ok(())
}

#[test]
fn test_memory_handler_reports_exceeded_usage() -> Result<()> {
    let logger = RecordingLogger::new();
    let mut handler = MemoryHandler::new().with_logger(
        logger.shared(),
        LoggingParams::new(Level::Critical).with_usage_limit("1KB"),
    );
    handler.record_usage(2048);

    handler.log()?;

    assert_logged_at(&logger, Level::Critical)?;
    assert!(logger.messages()[0].starts_with("Memory usage limit of"));
    Ok(())
}

#[test]
fn test_query_handler_reports_slow_steps_only() -> Result<()> {
    let profiler = Arc::new(QueryProfiler::new());
    let fast = profiler.begin_at("SELECT 1", json!([]), 1.0);
    profiler.end_at(fast, 1.125);
    let slow = profiler.begin_at("SELECT * FROM t", json!([]), 2.0);
    profiler.end_at(slow, 2.75);
    profiler.finish_profile_at(3.0);

    let logger = RecordingLogger::new();
    let mut handler = QueryHandler::new(profiler).with_logger(
        logger.shared(),
        LoggingParams::new(Level::Notice).with_limit(0.5),
    );

    handler.log()?;

    assert_logged_at(&logger, Level::Notice)?;
    assert_eq!(
        logger.messages(),
        vec!["Query exceeded the limit of 0.5 second(s) by 0.25000 second(s): SELECT * FROM t"]
    );
    Ok(())
}

#[test]
fn test_log_handler_forwards_entries_at_configured_level() -> Result<()> {
    let logger = RecordingLogger::new();
    let mut handler =
        LogHandler::new().with_logger(logger.shared(), LoggingParams::new(Level::Warning));
    handler
        .add_log(Level::Debug, "noise", json!({}))
        .add_log(Level::Error, "disk full", json!({"disk": "/"}));

    handler.log()?;

    assert_logged_at(&logger, Level::Warning)?;
    assert_eq!(logger.messages(), vec!["noise", "disk full"]);
    let records = logger.records();
    assert_eq!(records[0].context["level"], "debug");
    assert_eq!(records[1].context["level"], "error");
    assert_eq!(records[1].context["context"], json!({"disk": "/"}));
    Ok(())
}

#[test]
fn test_every_seeded_handler_logs_at_configured_level() -> Result<()> {
    let profiler = Arc::new(QueryProfiler::new());
    let step = profiler.begin_at("SELECT 1", json!([]), 1.0);
    profiler.end_at(step, 1.5);
    profiler.finish_profile_at(2.0);

    let mut exception = ExceptionHandler::new();
    exception.add_error(&std::io::Error::other("connection reset"));

    let mut log = LogHandler::new();
    log.add_log(Level::Debug, "cache miss", json!({"key": "user:1"}));

    let mut memory = MemoryHandler::new();
    memory.record_usage(4096);
    memory.record_peak(8192);

    let mut message = MessageHandler::new();
    message.add_message_at("ready", 1.0);

    let mut time = TimeHandler::started_at(1.0);
    time.stop(Some(1.5));

    let handlers: Vec<Box<dyn Handler>> = vec![
        Box::new(exception),
        Box::new(log),
        Box::new(memory),
        Box::new(message),
        Box::new(QueryHandler::new(profiler)),
        Box::new(RequestHandler::new(RequestSnapshot::new("POST", "/orders"))),
        Box::new(RuntimeHandler::new().with_app("demo", "1.0.0")),
        Box::new(time),
    ];
    assert_eq!(handlers.len(), every_handler().len());

    for mut handler in handlers {
        let logger = RecordingLogger::new();
        handler.set_logger(logger.shared());
        handler.set_logging_params(LoggingParams::new(Level::Notice));

        handler.log()?;

        assert_logged_at(&logger, Level::Notice)
            .map_err(|e| anyhow::anyhow!("{}: {}", handler.handler_type(), e))?;
    }
    Ok(())
}
