mod lessons;

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use lumen_engine::core::Lesson;
use lumen_engine::device::GpuInit;
use lumen_engine::logging::{LoggingConfig, init_logging};
use lumen_engine::window::{Runtime, RuntimeConfig};
use winit::dpi::LogicalSize;

use lessons::{
    ClearLesson, IndexedQuadLesson, MirrorLesson, MirrorPostLesson, PostProcessLesson,
    TexturedCubeLesson, TexturedQuadLesson, TriangleLesson, VertexColorLesson, WINDOW_HEIGHT,
    WINDOW_WIDTH,
};

/// Lesson picked on the command line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
enum LessonKind {
    Clear,
    Triangle,
    VertexColor,
    IndexedQuad,
    TexturedQuad,
    TexturedCube,
    Mirror,
    PostProcess,
    #[default]
    MirrorPost,
}

impl LessonKind {
    const ALL: [LessonKind; 9] = [
        Self::Clear,
        Self::Triangle,
        Self::VertexColor,
        Self::IndexedQuad,
        Self::TexturedQuad,
        Self::TexturedCube,
        Self::Mirror,
        Self::PostProcess,
        Self::MirrorPost,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Triangle => "triangle",
            Self::VertexColor => "vertex-color",
            Self::IndexedQuad => "indexed-quad",
            Self::TexturedQuad => "textured-quad",
            Self::TexturedCube => "textured-cube",
            Self::Mirror => "mirror",
            Self::PostProcess => "post-process",
            Self::MirrorPost => "mirror-post",
        }
    }
}

impl fmt::Display for LessonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LessonKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::ALL.into_iter().find(|k| k.name() == s) {
            Some(kind) => Ok(kind),
            None => {
                let names: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
                bail!("unknown lesson `{s}`; available: {}", names.join(", "))
            }
        }
    }
}

fn run<L: Lesson + 'static>(lesson: L) -> Result<()> {
    let config = RuntimeConfig {
        title: format!("lumen: {}", lesson.name()),
        initial_size: LogicalSize::new(f64::from(WINDOW_WIDTH), f64::from(WINDOW_HEIGHT)),
    };
    Runtime::run(config, GpuInit::default(), lesson)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let kind = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<LessonKind>()?,
        None => LessonKind::default(),
    };
    log::info!("running lesson `{kind}`");

    match kind {
        LessonKind::Clear => run(ClearLesson),
        LessonKind::Triangle => run(TriangleLesson::default()),
        LessonKind::VertexColor => run(VertexColorLesson::default()),
        LessonKind::IndexedQuad => run(IndexedQuadLesson::default()),
        LessonKind::TexturedQuad => run(TexturedQuadLesson::default()),
        LessonKind::TexturedCube => run(TexturedCubeLesson::default()),
        LessonKind::Mirror => run(MirrorLesson::default()),
        LessonKind::PostProcess => run(PostProcessLesson::default()),
        LessonKind::MirrorPost => run(MirrorPostLesson::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_lesson_name_parses_back() {
        for kind in LessonKind::ALL {
            assert_eq!(kind.name().parse::<LessonKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_lesson_lists_the_catalogue() {
        let err = "day-zero".parse::<LessonKind>().unwrap_err().to_string();
        assert!(err.contains("mirror-post"), "{err}");
    }

    #[test]
    fn default_lesson_is_the_full_pipeline() {
        assert_eq!(LessonKind::default(), LessonKind::MirrorPost);
    }
}
