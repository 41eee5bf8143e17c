use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::display::DisplayController;
use crate::messages::{CommandError, CommandSink, PlayerCommand, PlayerPush, WindowResponse};
use crate::player::PlayerFactory;

/// One attached display of the machine the controller runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub primary: bool,
}

impl MonitorBounds {
    pub fn primary(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            primary: true,
        }
    }

    pub fn secondary(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            primary: false,
        }
    }
}

/// Where the display window should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

const FALLBACK_WIDTH: u32 = 1280;
const FALLBACK_HEIGHT: u32 = 720;
const FALLBACK_OFFSET: i32 = 50;

/// Placement policy: full-screen on the first secondary monitor when one is
/// present, otherwise a bounded window on the primary.
pub fn place_display_window(monitors: &[MonitorBounds]) -> WindowBounds {
    if let Some(secondary) = monitors.iter().find(|m| !m.primary) {
        return WindowBounds {
            x: secondary.x,
            y: secondary.y,
            width: secondary.width,
            height: secondary.height,
            fullscreen: true,
        };
    }
    let origin = monitors
        .iter()
        .find(|m| m.primary)
        .map(|m| (m.x, m.y))
        .unwrap_or((0, 0));
    WindowBounds {
        x: origin.0 + FALLBACK_OFFSET,
        y: origin.1 + FALLBACK_OFFSET,
        width: FALLBACK_WIDTH,
        height: FALLBACK_HEIGHT,
        fullscreen: false,
    }
}

struct DisplayWindow {
    id: u64,
    cmd_tx: mpsc::UnboundedSender<PlayerCommand>,
    task: JoinHandle<()>,
}

/// Central relay between the control and display windows: a dumb pipe for
/// named messages plus the two window lifecycle operations. Holds no
/// business logic about message content.
pub struct MessageRouter {
    window: Mutex<Option<DisplayWindow>>,
    next_window_id: AtomicU64,
    player_factory: PlayerFactory,
    monitors: Vec<MonitorBounds>,
    push_tx: mpsc::UnboundedSender<PlayerPush>,
}

impl MessageRouter {
    /// `push_tx` is the display-to-control half of the pipe; the proxy owns
    /// the receiving end.
    pub fn new(
        player_factory: PlayerFactory,
        monitors: Vec<MonitorBounds>,
        push_tx: mpsc::UnboundedSender<PlayerPush>,
    ) -> Self {
        Self {
            window: Mutex::new(None),
            next_window_id: AtomicU64::new(1),
            player_factory,
            monitors,
            push_tx,
        }
    }

    /// Create-or-reuse: returns the existing window id when the display is
    /// already open. Must be called from within a tokio runtime.
    pub fn open_display_window(&self) -> WindowResponse {
        let mut window = self.window.lock();
        if let Some(existing) = window.as_ref() {
            if !existing.cmd_tx.is_closed() {
                log::debug!("display window {} already open", existing.id);
                return WindowResponse::ok(existing.id);
            }
        }

        let bounds = place_display_window(&self.monitors);
        let id = self.next_window_id.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "opening display window {id} at {},{} {}x{} (fullscreen: {})",
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height,
            bounds.fullscreen
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let player = (self.player_factory)(event_tx);
        let controller = DisplayController::new(player, cmd_rx, event_rx, self.push_tx.clone());
        let task = tokio::spawn(controller.run());

        *window = Some(DisplayWindow { id, cmd_tx, task });
        WindowResponse::ok(id)
    }

    /// Close the display window. Succeeds as a no-op when already closed.
    pub async fn close_display_window(&self) -> WindowResponse {
        let window = self.window.lock().take();
        match window {
            Some(window) => {
                log::info!("closing display window {}", window.id);
                // Dropping the command sender ends the controller loop,
                // which destroys the player before the task finishes.
                drop(window.cmd_tx);
                if let Err(e) = window.task.await {
                    log::warn!("display controller task ended abnormally: {e}");
                }
                WindowResponse::closed()
            }
            None => WindowResponse::closed(),
        }
    }

    pub fn display_window_open(&self) -> bool {
        self.window
            .lock()
            .as_ref()
            .map(|w| !w.cmd_tx.is_closed())
            .unwrap_or(false)
    }
}

impl CommandSink for MessageRouter {
    /// Relay a command verbatim to the display side. The caller gets a
    /// definitive outcome: delivered, or the display window is not there.
    fn send_command(&self, command: PlayerCommand) -> Result<(), CommandError> {
        let window = self.window.lock();
        match window.as_ref() {
            Some(window) => window
                .cmd_tx
                .send(command)
                .map_err(|_| CommandError::DisplayUnavailable),
            None => Err(CommandError::DisplayUnavailable),
        }
    }
}
