//! Voice catalog and `!voice` token matching.

/// One selectable synthesis voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Identifier used for matching and display, e.g. `en-us_English_(America)`.
    pub id: String,
    /// Name the engine expects when selecting this voice, e.g. `en-us`.
    pub engine_name: String,
}

impl Voice {
    pub fn new(id: impl Into<String>, engine_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            engine_name: engine_name.into(),
        }
    }
}

/// Ordered list of voices exposed by the synthesis engine.
///
/// Indices into this list are what voice profiles store, so the order must
/// be the engine's own order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    #[must_use]
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Index of the first voice matching `token`, if any.
    #[must_use]
    pub fn find(&self, token: &str) -> Option<usize> {
        self.voices
            .iter()
            .position(|voice| voice_matches(&voice.id, token))
    }
}

/// Whether a `!voice` token selects the voice with identifier `id`.
///
/// Two-letter tokens are language codes and must equal a whole `-`/`_`
/// delimited segment of the identifier, so `EN` matches `MS_EN-US_ZIRA` but
/// not `FOREIGN`. Longer tokens match as a case-insensitive substring.
#[must_use]
pub fn voice_matches(id: &str, token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() {
        return false;
    }
    if token.chars().count() == 2 {
        id.split(['-', '_', '/', '\\'])
            .any(|segment| segment.eq_ignore_ascii_case(token))
    } else {
        id.to_lowercase().contains(&token.to_lowercase())
    }
}
