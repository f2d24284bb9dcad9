pub mod api;
pub mod assets;
pub mod history;
pub mod server;

#[cfg(test)]
pub mod testing {
    use super::server::AppState;
    use crate::cli::Args;
    use crate::review::session::SharedSession;
    use crate::video::testing::SyntheticMedia;
    use crate::video::{MediaElement, MediaError, MediaOpener};
    use clap::Parser;
    use std::time::Duration;

    /// Opens a 2 second synthetic clip for any location except `*missing*`.
    pub fn synthetic_opener() -> MediaOpener {
        Box::new(|location: &str| {
            if location.contains("missing") {
                Err(MediaError::SrcNotSupported(location.to_string()))
            } else {
                Ok(Box::new(SyntheticMedia::new(60, 16, 16)) as Box<dyn MediaElement>)
            }
        })
    }

    pub fn app_state(detect_url: &str) -> AppState {
        let args = Args::try_parse_from(["tray-review", "--detect-url", detect_url]).unwrap();
        AppState::new(args, synthetic_opener()).unwrap()
    }

    /// Wait until the player thread has delivered a captured frame.
    pub async fn wait_for_frame(session: &SharedSession) {
        for _ in 0..200 {
            if session.lock().current_frame().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no frame captured");
    }
}
