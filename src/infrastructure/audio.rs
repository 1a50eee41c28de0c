use crate::infrastructure::error::InfraError;

pub trait AudioHandle: Send {
    fn stop(&mut self);
}

pub trait AudioPlayer: Send + Sync {
    fn play_loop(&self, url: &str) -> Result<Box<dyn AudioHandle>, InfraError>;
}

/// Terminal stand-in for the browser's looping `<audio>` element: it points
/// the user at the stream instead of decoding it.
#[derive(Debug, Default, Clone)]
pub struct AnnouncingAudioPlayer;

struct AnnouncedStream {
    url: String,
    stopped: bool,
}

impl AudioHandle for AnnouncedStream {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            tracing::info!(url = %self.url, "ambient audio stopped");
        }
    }
}

impl AudioPlayer for AnnouncingAudioPlayer {
    fn play_loop(&self, url: &str) -> Result<Box<dyn AudioHandle>, InfraError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(InfraError::InvalidInput(
                "audio url must not be empty".to_string(),
            ));
        }
        tracing::info!(url = %url, "ambient audio playing");
        println!("🎧 Ambient forest audio: {url}");
        Ok(Box::new(AnnouncedStream {
            url: url.to_string(),
            stopped: false,
        }))
    }
}
