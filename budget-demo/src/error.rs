use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("engine error: {0}")]
    Engine(#[from] persist_engine::EngineError),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type DemoResult<T> = Result<T, DemoError>;
