use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarColor {
    #[default]
    CYAN,
    MAGENTA,
    RED,
    GREEN,
}

/// The piece of work a status message refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    #[default]
    Generate,
    Train,
    Validation,
    Test,
}

impl Stage {
    /// Dataset group name in the output archive
    pub fn group_name(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Train => "train",
            Self::Validation => "val",
            Self::Test => "test",
        }
    }

    pub fn color(&self) -> BarColor {
        match self {
            Self::Generate => BarColor::GREEN,
            Self::Train => BarColor::CYAN,
            Self::Validation => BarColor::MAGENTA,
            Self::Test => BarColor::RED,
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.group_name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub stage: Stage,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, stage: Stage, worker_id: usize) -> Self {
        Self {
            progress,
            stage,
            worker_id,
            color: stage.color(),
        }
    }
}
