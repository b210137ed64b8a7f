//! OS cursor backends: real injection through enigo, and a dry-run sink
//! that only logs.

use anyhow::{Result, anyhow};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use tracing::{debug, info};
use tracking_core::{CursorError, CursorSink, ScreenSize};

pub(crate) struct EnigoCursor {
    enigo: Enigo,
}

impl EnigoCursor {
    pub(crate) fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|err| anyhow!("failed to connect to the input system: {err:?}"))?;
        Ok(Self { enigo })
    }

    /// Size of the main display in pixels.
    pub(crate) fn screen_size(&self) -> Result<ScreenSize> {
        let (width, height) = self
            .enigo
            .main_display()
            .map_err(|err| anyhow!("failed to query the main display: {err:?}"))?;
        let width = u32::try_from(width).ok().filter(|w| *w > 0);
        let height = u32::try_from(height).ok().filter(|h| *h > 0);
        match (width, height) {
            (Some(width), Some(height)) => Ok(ScreenSize::new(width, height)),
            _ => Err(anyhow!("main display reported an empty size")),
        }
    }
}

impl CursorSink for EnigoCursor {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), CursorError> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|err| CursorError::new(format!("{err:?}")))
    }

    fn press(&mut self) -> Result<(), CursorError> {
        self.enigo
            .button(Button::Left, Direction::Press)
            .map_err(|err| CursorError::new(format!("{err:?}")))
    }

    fn release(&mut self) -> Result<(), CursorError> {
        self.enigo
            .button(Button::Left, Direction::Release)
            .map_err(|err| CursorError::new(format!("{err:?}")))
    }
}

/// Logs cursor actions instead of injecting them.
#[derive(Debug, Default)]
pub(crate) struct DryRunCursor {
    position: Option<(i32, i32)>,
    pressed: bool,
}

impl CursorSink for DryRunCursor {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), CursorError> {
        if self.position != Some((x, y)) {
            debug!(x, y, pressed = self.pressed, "dry-run: move");
            self.position = Some((x, y));
        }
        Ok(())
    }

    fn press(&mut self) -> Result<(), CursorError> {
        self.pressed = true;
        info!(position = ?self.position, "dry-run: press");
        Ok(())
    }

    fn release(&mut self) -> Result<(), CursorError> {
        self.pressed = false;
        info!(position = ?self.position, "dry-run: release");
        Ok(())
    }
}

/// Cursor backend for one pipeline run.
pub(crate) fn open(dry_run: bool) -> Result<Box<dyn CursorSink>> {
    if dry_run {
        return Ok(Box::new(DryRunCursor::default()));
    }
    Ok(Box::new(EnigoCursor::new()?))
}

/// Resolve the screen extent, querying the OS when none was configured.
pub(crate) fn resolve_screen(configured: Option<ScreenSize>) -> Result<ScreenSize> {
    match configured {
        Some(screen) => Ok(screen),
        None => EnigoCursor::new()?.screen_size(),
    }
}
