//! Setup flow for one background replacement session.
//!
//! A session first needs the replacement image, then a photo of the empty
//! scene, and only then composites frames. Any step can be redone without
//! throwing the session away.

use crate::compositor::{BackgroundCompositor, BinarizePolicy, CompositingParameters};
use crate::error::{Error, Result};
use image::{DynamicImage, RgbImage};

#[derive(Debug, Clone)]
pub enum SessionState {
    AwaitingVirtualBackground,
    AwaitingReferenceCapture { virtual_background: DynamicImage },
    Compositing {
        virtual_background: DynamicImage,
        compositor: BackgroundCompositor,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingVirtualBackground => "awaiting virtual background",
            Self::AwaitingReferenceCapture { .. } => "awaiting reference capture",
            Self::Compositing { .. } => "compositing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    policy: BinarizePolicy,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingVirtualBackground,
            policy: BinarizePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BinarizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Pick (or re-pick) the replacement image
    ///
    /// When a reference was already captured the compositor is rebuilt
    /// against it; on failure the session is left untouched.
    pub fn set_virtual_background(&mut self, image: DynamicImage) -> Result<()> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::configuration("virtual background is empty"));
        }

        self.state = match &self.state {
            SessionState::Compositing { compositor, .. } => {
                let reference = DynamicImage::ImageRgb8(compositor.reference().clone());
                let compositor =
                    BackgroundCompositor::new(&reference, &image)?.with_policy(self.policy);
                SessionState::Compositing {
                    virtual_background: image,
                    compositor,
                }
            }
            _ => SessionState::AwaitingReferenceCapture {
                virtual_background: image,
            },
        };
        tracing::info!("Session {}", self.state.name());
        Ok(())
    }

    /// Take `frame` as the empty-scene reference (first capture or re-capture)
    pub fn capture_reference(&mut self, frame: DynamicImage) -> Result<()> {
        let virtual_background = match &self.state {
            SessionState::AwaitingVirtualBackground => {
                return Err(Error::configuration(
                    "a virtual background must be chosen before capturing the reference",
                ))
            }
            SessionState::AwaitingReferenceCapture { virtual_background }
            | SessionState::Compositing {
                virtual_background, ..
            } => virtual_background.clone(),
        };

        let compositor =
            BackgroundCompositor::new(&frame, &virtual_background)?.with_policy(self.policy);
        let (width, height) = compositor.dimensions();
        tracing::info!("Captured reference background at {}x{}", width, height);

        self.state = SessionState::Compositing {
            virtual_background,
            compositor,
        };
        Ok(())
    }

    /// Drop the captured reference, keeping the chosen virtual background
    pub fn discard_reference(&mut self) {
        if let SessionState::Compositing {
            virtual_background, ..
        } = &self.state
        {
            self.state = SessionState::AwaitingReferenceCapture {
                virtual_background: virtual_background.clone(),
            };
        }
    }

    /// Back to the first step
    pub fn reset(&mut self) {
        self.state = SessionState::AwaitingVirtualBackground;
    }

    pub fn compositor(&self) -> Option<&BackgroundCompositor> {
        match &self.state {
            SessionState::Compositing { compositor, .. } => Some(compositor),
            _ => None,
        }
    }

    pub fn composite(&self, frame: &RgbImage, params: &CompositingParameters) -> Result<RgbImage> {
        self.compositor()
            .ok_or_else(|| {
                Error::configuration(format!(
                    "cannot composite while {}",
                    self.state.name()
                ))
            })?
            .composite(frame, params)
    }
}
