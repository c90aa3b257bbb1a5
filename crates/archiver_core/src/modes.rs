use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    #[error("--all cannot be combined with --source, --html, --att or --clean")]
    AllIsExclusive,
}

/// Which passes a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunModes {
    pub source: bool,
    pub html: bool,
    pub attachments: bool,
    pub clean: bool,
}

impl RunModes {
    pub fn all() -> Self {
        Self {
            source: true,
            html: true,
            attachments: true,
            clean: true,
        }
    }

    /// Combines command-line flags. No flag at all means everything.
    pub fn from_flags(
        all: bool,
        source: bool,
        html: bool,
        attachments: bool,
        clean: bool,
    ) -> Result<Self, ModeError> {
        let any_individual = source || html || attachments || clean;
        if all && any_individual {
            return Err(ModeError::AllIsExclusive);
        }
        if all || !any_individual {
            return Ok(Self::all());
        }
        Ok(Self {
            source,
            html,
            attachments,
            clean,
        })
    }

    /// Freshly fetched HTML is always cleaned.
    pub fn runs_cleaner(&self) -> bool {
        self.html || self.clean
    }
}
