//! Effector boundary: simulated input
//!
//! The dispatcher talks to an [`Effector`], never to a concrete input
//! library. Two backends are supplied: [`ShellEffector`] drives `xdotool`
//! (Linux) or `cliclick` (macOS), and [`LoggingEffector`] records actions to
//! the log for dry runs and tests.
//!
//! Backends carry a fail-safe flag analogous to an abort-corner gesture. The
//! controller suspends it for the duration of the automation via
//! [`FailsafeGuard`], which restores it on every exit path.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::shell::{have_program, run_cmd};

/// The fixed set of input operations an effector must provide.
#[async_trait]
pub trait Effector: Send + Sync {
    async fn click(&self, x: i64, y: i64) -> Result<()>;
    async fn double_click(&self, x: i64, y: i64) -> Result<()>;
    async fn right_click(&self, x: i64, y: i64) -> Result<()>;
    async fn type_text(&self, text: &str) -> Result<()>;
    async fn key_down(&self, key: &str) -> Result<()>;
    async fn key_up(&self, key: &str) -> Result<()>;
    async fn press(&self, key: &str) -> Result<()>;
    async fn move_to(&self, x: i64, y: i64, duration: f64) -> Result<()>;
    async fn scroll(&self, clicks: i64, x: Option<i64>, y: Option<i64>) -> Result<()>;
    async fn page_down(&self) -> Result<()>;

    /// Toggle the backend's fail-safe override. `true` means the operator's
    /// emergency abort gesture is honored; automation runs with it off.
    fn set_failsafe(&self, enabled: bool);

    /// Current fail-safe state.
    fn failsafe(&self) -> bool;
}

/// Suspends the effector fail-safe for the lifetime of the guard and
/// restores it when dropped, on every exit path including panics and
/// cancellation unwinds.
pub struct FailsafeGuard {
    effector: Arc<dyn Effector>,
}

impl FailsafeGuard {
    pub fn suspend(effector: Arc<dyn Effector>) -> Self {
        effector.set_failsafe(false);
        debug!("fail-safe suspended for automation");
        FailsafeGuard { effector }
    }
}

impl Drop for FailsafeGuard {
    fn drop(&mut self) {
        self.effector.set_failsafe(true);
        info!("fail-safe restored");
    }
}

/// Which input utility drives the shell backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputDriver {
    /// `xdotool` (X11)
    Xdotool,
    /// `cliclick` (macOS)
    Cliclick,
}

/// Input simulation via an external command-line utility.
pub struct ShellEffector {
    driver: InputDriver,
    failsafe: AtomicBool,
}

impl ShellEffector {
    /// Probe the system for a supported input utility.
    pub async fn detect() -> Result<Self> {
        let driver = if have_program("xdotool").await {
            InputDriver::Xdotool
        } else if have_program("cliclick").await {
            InputDriver::Cliclick
        } else {
            return Err(anyhow!(
                "no input utility found; install xdotool (Linux) or cliclick (macOS), \
                 or run with --dry-run"
            ));
        };
        Ok(ShellEffector {
            driver,
            failsafe: AtomicBool::new(true),
        })
    }

    async fn xdotool(&self, args: &[&str]) -> Result<()> {
        run_cmd("xdotool", args).await.map(|_| ())
    }

    async fn cliclick(&self, arg: &str) -> Result<()> {
        run_cmd("cliclick", &[arg]).await.map(|_| ())
    }
}

#[async_trait]
impl Effector for ShellEffector {
    async fn click(&self, x: i64, y: i64) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => {
                self.xdotool(&["mousemove", &x.to_string(), &y.to_string(), "click", "1"])
                    .await
            }
            InputDriver::Cliclick => self.cliclick(&format!("c:{x},{y}")).await,
        }
    }

    async fn double_click(&self, x: i64, y: i64) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => {
                self.xdotool(&[
                    "mousemove",
                    &x.to_string(),
                    &y.to_string(),
                    "click",
                    "--repeat",
                    "2",
                    "1",
                ])
                .await
            }
            InputDriver::Cliclick => self.cliclick(&format!("dc:{x},{y}")).await,
        }
    }

    async fn right_click(&self, x: i64, y: i64) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => {
                self.xdotool(&["mousemove", &x.to_string(), &y.to_string(), "click", "3"])
                    .await
            }
            InputDriver::Cliclick => self.cliclick(&format!("rc:{x},{y}")).await,
        }
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => self.xdotool(&["type", "--", text]).await,
            InputDriver::Cliclick => self.cliclick(&format!("t:{text}")).await,
        }
    }

    async fn key_down(&self, key: &str) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => self.xdotool(&["keydown", key]).await,
            InputDriver::Cliclick => self.cliclick(&format!("kd:{key}")).await,
        }
    }

    async fn key_up(&self, key: &str) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => self.xdotool(&["keyup", key]).await,
            InputDriver::Cliclick => self.cliclick(&format!("ku:{key}")).await,
        }
    }

    async fn press(&self, key: &str) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => self.xdotool(&["key", key]).await,
            InputDriver::Cliclick => self.cliclick(&format!("kp:{key}")).await,
        }
    }

    async fn move_to(&self, x: i64, y: i64, _duration: f64) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => {
                self.xdotool(&["mousemove", &x.to_string(), &y.to_string()])
                    .await
            }
            InputDriver::Cliclick => self.cliclick(&format!("m:{x},{y}")).await,
        }
    }

    async fn scroll(&self, clicks: i64, x: Option<i64>, y: Option<i64>) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => {
                if let (Some(x), Some(y)) = (x, y) {
                    self.xdotool(&["mousemove", &x.to_string(), &y.to_string()])
                        .await?;
                }
                // Wheel up is button 4, wheel down button 5.
                let button = if clicks >= 0 { "4" } else { "5" };
                let repeat = clicks.unsigned_abs().max(1).to_string();
                self.xdotool(&["click", "--repeat", &repeat, button]).await
            }
            InputDriver::Cliclick => {
                // cliclick has no wheel primitive; reporting the failure lets
                // the oracle fall back to pagedown on the next cycle.
                Err(anyhow!("scroll is not supported by the cliclick backend"))
            }
        }
    }

    async fn page_down(&self) -> Result<()> {
        match self.driver {
            InputDriver::Xdotool => self.xdotool(&["key", "Page_Down"]).await,
            InputDriver::Cliclick => self.cliclick("kp:page-down").await,
        }
    }

    fn set_failsafe(&self, enabled: bool) {
        self.failsafe.store(enabled, Ordering::SeqCst);
    }

    fn failsafe(&self) -> bool {
        self.failsafe.load(Ordering::SeqCst)
    }
}

/// Dry-run effector: every action is logged and reported as successful.
pub struct LoggingEffector {
    failsafe: AtomicBool,
}

impl LoggingEffector {
    pub fn new() -> Self {
        LoggingEffector {
            failsafe: AtomicBool::new(true),
        }
    }
}

impl Default for LoggingEffector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Effector for LoggingEffector {
    async fn click(&self, x: i64, y: i64) -> Result<()> {
        info!("click at ({x}, {y})");
        Ok(())
    }

    async fn double_click(&self, x: i64, y: i64) -> Result<()> {
        info!("double-click at ({x}, {y})");
        Ok(())
    }

    async fn right_click(&self, x: i64, y: i64) -> Result<()> {
        info!("right-click at ({x}, {y})");
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        info!("type {text:?}");
        Ok(())
    }

    async fn key_down(&self, key: &str) -> Result<()> {
        info!("key down {key:?}");
        Ok(())
    }

    async fn key_up(&self, key: &str) -> Result<()> {
        info!("key up {key:?}");
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<()> {
        info!("press {key:?}");
        Ok(())
    }

    async fn move_to(&self, x: i64, y: i64, duration: f64) -> Result<()> {
        info!("move to ({x}, {y}) over {duration}s");
        Ok(())
    }

    async fn scroll(&self, clicks: i64, x: Option<i64>, y: Option<i64>) -> Result<()> {
        info!("scroll {clicks} clicks at ({x:?}, {y:?})");
        Ok(())
    }

    async fn page_down(&self) -> Result<()> {
        info!("page down");
        Ok(())
    }

    fn set_failsafe(&self, enabled: bool) {
        self.failsafe.store(enabled, Ordering::SeqCst);
    }

    fn failsafe(&self) -> bool {
        self.failsafe.load(Ordering::SeqCst)
    }
}
