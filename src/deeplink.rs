//! Deep links into players
//!
//! A deep link is a URL fragment of the form `#<player-id>&t=<timecode>`.
//! Opening a page with such a fragment seeks the named player once it is
//! ready; clicking a time-jump link seeks (and starts) it right away.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, info};
use url::Url;

/// Characters left alone by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Parse `HH:MM:SS`, `MM:SS` or `SS` into whole seconds.
///
/// Anything other than digits and colons is dropped first; empty parts
/// count as zero and more than three parts give zero.
pub fn parse_timecode(input: &str) -> f64 {
    let clean = input.trim();
    if clean.is_empty() {
        return 0.0;
    }
    let normalized: String = clean
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect();
    let parts: Vec<f64> = normalized
        .split(':')
        .map(|p| p.parse().unwrap_or(0.0))
        .collect();
    match parts.as_slice() {
        [h, m, s] => h * 3600.0 + m * 60.0 + s,
        [m, s] => m * 60.0 + s,
        [s] => *s,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    pub id: String,
    pub time: String,
}

impl DeepLink {
    pub fn seconds(&self) -> f64 {
        parse_timecode(&self.time)
    }

    pub fn to_hash(&self) -> String {
        encode_hash(&self.id, &self.time)
    }
}

/// Parse a `#ID&t=TIME` fragment. The leading `#` is optional.
///
/// Returns `None` without an id or without a non-empty `t` parameter.
pub fn parse_hash(hash: &str) -> Option<DeepLink> {
    let raw = hash.strip_prefix('#').unwrap_or(hash);
    let mut parts = raw.split('&');
    let id = parts.next().filter(|id| !id.is_empty())?;
    let time = parts
        .find_map(|piece| {
            let mut kv = piece.split('=');
            match kv.next() {
                Some("t") => Some(kv.next().unwrap_or("")),
                _ => None,
            }
        })
        .filter(|t| !t.is_empty())?;

    match (decode(id), decode(time)) {
        (Some(id), Some(time)) => Some(DeepLink { id, time }),
        _ => Some(DeepLink {
            id: id.to_string(),
            time: time.to_string(),
        }),
    }
}

/// `None` for a `%` not followed by two hex digits or for bytes that are
/// not UTF-8.
fn decode(component: &str) -> Option<String> {
    let bytes = component.as_bytes();
    let well_formed = bytes
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == b'%')
        .all(|(i, _)| {
            bytes
                .get(i + 1..i + 3)
                .map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit))
        });
    if !well_formed {
        return None;
    }
    percent_decode_str(component)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

pub fn encode_hash(id: &str, time: &str) -> String {
    format!(
        "#{}&t={}",
        utf8_percent_encode(id, COMPONENT),
        utf8_percent_encode(time, COMPONENT)
    )
}

/// A media player as far as jumping is concerned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Player {
    pub id: String,
    pub wrapper_id: Option<String>,
    pub media_id: Option<String>,
    pub ready: bool,
    pub current_time: f64,
    pub playing: bool,
}

impl Player {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_wrapper_id(mut self, id: impl Into<String>) -> Self {
        self.wrapper_id = Some(id.into());
        self
    }

    pub fn with_media_id(mut self, id: impl Into<String>) -> Self {
        self.media_id = Some(id.into());
        self
    }

    fn answers_to(&self, id: &str) -> bool {
        self.id == id
            || self.wrapper_id.as_deref() == Some(id)
            || self.media_id.as_deref() == Some(id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, player: Player) {
        self.players.push(player);
    }

    /// First player, in registration order, whose own, wrapper or media
    /// element id is `id`.
    pub fn find(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.answers_to(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.answers_to(id))
    }

    pub fn mark_ready(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(player) => {
                player.ready = true;
                true
            }
            None => false,
        }
    }

    fn is_ready(&self, id: &str) -> bool {
        self.find(id).map_or(false, |p| p.ready)
    }

    /// Move the player to the seek position. An autoplay seek also starts a
    /// paused player; a playing one is left playing.
    pub fn apply(&mut self, seek: &Seek) -> bool {
        if !seek.seconds.is_finite() {
            return false;
        }
        match self.find_mut(&seek.player_id) {
            Some(player) => {
                player.current_time = seek.seconds;
                if seek.autoplay && !player.playing {
                    player.playing = true;
                }
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Seek {
    pub player_id: String,
    pub seconds: f64,
    pub autoplay: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingJump {
    pub player_id: String,
    pub seconds: f64,
}

/// A time-jump link as found in the page.
#[derive(Debug, Clone, Default)]
pub struct TimeLink {
    /// `data-player` attribute.
    pub player: Option<String>,
    /// `data-time` attribute.
    pub time: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickOutcome {
    /// The link points at the current page, so navigation should be suppressed.
    pub same_page: bool,
    /// New location hash, when it differs from the current one.
    pub replace_hash: Option<String>,
    /// Element to scroll into view.
    pub scroll_to: Option<String>,
    /// Seek applied right away. `None` when the jump was left pending.
    pub seek: Option<Seek>,
}

/// Holds at most one jump waiting for its player to become ready.
#[derive(Debug, Clone, Default)]
pub struct JumpController {
    pending: Option<PendingJump>,
}

impl JumpController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingJump> {
        self.pending.as_ref()
    }

    /// Pick up a deep link from the page's initial location hash. The jump
    /// only seeks, it never starts playback.
    pub fn restore(&mut self, hash: &str, registry: &mut PlayerRegistry) -> Option<Seek> {
        let link = parse_hash(hash)?;
        let seconds = link.seconds();
        if !seconds.is_finite() {
            return None;
        }
        debug!(player = %link.id, seconds, "deep link from location");
        self.pending = Some(PendingJump {
            player_id: link.id,
            seconds,
        });
        self.try_pending(registry)
    }

    /// Retry the pending jump. Call whenever a player reports ready.
    pub fn on_player_ready(&mut self, registry: &mut PlayerRegistry) -> Option<Seek> {
        self.try_pending(registry)
    }

    fn try_pending(&mut self, registry: &mut PlayerRegistry) -> Option<Seek> {
        let pending = self.pending.as_ref()?;
        if !registry.is_ready(&pending.player_id) {
            return None;
        }
        let seek = Seek {
            player_id: pending.player_id.clone(),
            seconds: pending.seconds,
            autoplay: false,
        };
        registry.apply(&seek);
        info!(player = %seek.player_id, seconds = seek.seconds, "applied pending jump");
        self.pending = None;
        Some(seek)
    }

    /// Handle a click on a time-jump link while the page is at `location`.
    ///
    /// Returns `None` when the link names no player or no time.
    pub fn click(
        &mut self,
        link: &TimeLink,
        location: &Url,
        registry: &mut PlayerRegistry,
    ) -> Option<ClickOutcome> {
        let target = link.href.as_deref().and_then(|href| location.join(href).ok());

        let mut player_id = link.player.clone().filter(|s| !s.is_empty());
        let mut time = link.time.clone().filter(|s| !s.is_empty());
        if player_id.is_none() || time.is_none() {
            if let Some(from_href) = target
                .as_ref()
                .and_then(|url| url.fragment())
                .and_then(parse_hash)
            {
                player_id = player_id.or(Some(from_href.id));
                time = time.or(Some(from_href.time));
            }
        }
        let (player_id, time) = (player_id?, time?);

        let seconds = parse_timecode(&time);
        if !seconds.is_finite() {
            return None;
        }

        // An href that cannot be resolved counts as pointing here.
        let same_page = target.as_ref().map_or(true, |url| {
            url.origin() == location.origin() && url.path() == location.path()
        });

        let (replace_hash, scroll_to) = if same_page {
            let hash = encode_hash(&player_id, &time);
            let current = location.fragment().map(|f| format!("#{}", f));
            let replace = if current.as_deref() == Some(hash.as_str()) {
                None
            } else {
                Some(hash)
            };
            (replace, Some(player_id.clone()))
        } else {
            (None, None)
        };

        let seek = if registry.is_ready(&player_id) {
            let seek = Seek {
                player_id,
                seconds,
                autoplay: true,
            };
            registry.apply(&seek);
            Some(seek)
        } else {
            debug!(player = %player_id, seconds, "player not ready, keeping jump pending");
            self.pending = Some(PendingJump { player_id, seconds });
            None
        };

        Some(ClickOutcome {
            same_page,
            replace_hash,
            scroll_to,
            seek,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_timecode {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected): (&str, f64) = $value;
                assert_eq!(parse_timecode(input), expected);
            }
        )*
        }
    }

    test_timecode! {
        test_timecode_0: ("01:23", 83.0),
        test_timecode_1: ("1:02:03", 3723.0),
        test_timecode_2: ("45", 45.0),
        test_timecode_3: ("", 0.0),
        test_timecode_4: ("   ", 0.0),
        test_timecode_5: (" 2m:05s ", 125.0),
        test_timecode_6: ("1:2:3:4", 0.0),
        test_timecode_7: (":30", 30.0),
        test_timecode_8: ("1.5", 15.0),
    }

    fn registry() -> PlayerRegistry {
        let mut registry = PlayerRegistry::new();
        registry.register(
            Player::new("p1")
                .with_wrapper_id("intro")
                .with_media_id("intro-audio"),
        );
        registry.register(Player::new("p2"));
        registry
    }

    fn page() -> Url {
        Url::parse("https://docs.example/en/talks.html").unwrap()
    }

    #[test]
    fn parses_hash() {
        assert_eq!(
            parse_hash("#intro&t=01:23"),
            Some(DeepLink {
                id: "intro".to_string(),
                time: "01:23".to_string()
            })
        );
    }

    #[test]
    fn hash_decodes_components() {
        let link = parse_hash("#my%20talk&x=1&t=01%3A23").unwrap();
        assert_eq!(link.id, "my talk");
        assert_eq!(link.time, "01:23");
        assert_eq!(link.seconds(), 83.0);
    }

    #[test]
    fn hash_with_invalid_utf8_stays_raw() {
        let link = parse_hash("#id%FF&t=01%3A00").unwrap();
        assert_eq!(link.id, "id%FF");
        assert_eq!(link.time, "01%3A00");
    }

    #[test]
    fn hash_with_bad_escape_stays_raw() {
        let link = parse_hash("#my%20talk&t=1%zz").unwrap();
        assert_eq!(link.id, "my%20talk");
        assert_eq!(link.time, "1%zz");

        let truncated = parse_hash("#intro%2&t=5").unwrap();
        assert_eq!(truncated.id, "intro%2");
    }

    #[test]
    fn hash_without_id_or_time() {
        assert_eq!(parse_hash(""), None);
        assert_eq!(parse_hash("#"), None);
        assert_eq!(parse_hash("#&t=5"), None);
        assert_eq!(parse_hash("#intro"), None);
        assert_eq!(parse_hash("#intro&t="), None);
        assert_eq!(parse_hash("#intro&time=5"), None);
    }

    #[test]
    fn first_time_parameter_wins() {
        assert_eq!(parse_hash("#a&t=1&t=2").unwrap().time, "1");
    }

    #[test]
    fn encodes_hash() {
        assert_eq!(encode_hash("intro", "01:23"), "#intro&t=01%3A23");
        assert_eq!(encode_hash("my talk(1)", "5"), "#my%20talk(1)&t=5");
        let link = parse_hash(&encode_hash("a&b", "1:00")).unwrap();
        assert_eq!(link.id, "a&b");
    }

    #[test]
    fn finds_player_by_any_id() {
        let registry = registry();
        assert_eq!(registry.find("p1").map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(registry.find("intro").map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(registry.find("intro-audio").map(|p| p.id.as_str()), Some("p1"));
        assert!(registry.find("nope").is_none());
    }

    #[test]
    fn restored_jump_waits_for_ready_player() {
        let mut registry = registry();
        let mut jumps = JumpController::new();

        assert_eq!(jumps.restore("#intro&t=01:23", &mut registry), None);
        assert!(jumps.pending().is_some());

        assert_eq!(jumps.on_player_ready(&mut registry), None);

        registry.mark_ready("p1");
        let seek = jumps.on_player_ready(&mut registry).unwrap();
        assert_eq!(seek.seconds, 83.0);
        assert!(!seek.autoplay);
        assert!(jumps.pending().is_none());

        let player = registry.find("p1").unwrap();
        assert_eq!(player.current_time, 83.0);
        assert!(!player.playing);
    }

    #[test]
    fn restored_jump_applies_at_once_when_ready() {
        let mut registry = registry();
        registry.mark_ready("p2");
        let mut jumps = JumpController::new();
        let seek = jumps.restore("#p2&t=10", &mut registry).unwrap();
        assert_eq!(seek.player_id, "p2");
        assert!(jumps.pending().is_none());
    }

    #[test]
    fn restore_ignores_plain_anchor() {
        let mut registry = registry();
        let mut jumps = JumpController::new();
        assert_eq!(jumps.restore("#section-2", &mut registry), None);
        assert!(jumps.pending().is_none());
    }

    #[test]
    fn click_on_same_page_link() {
        let mut registry = registry();
        registry.mark_ready("p1");
        let mut jumps = JumpController::new();
        let link = TimeLink {
            href: Some("#intro&t=01:23".to_string()),
            ..TimeLink::default()
        };

        let outcome = jumps.click(&link, &page(), &mut registry).unwrap();
        assert!(outcome.same_page);
        assert_eq!(outcome.replace_hash.as_deref(), Some("#intro&t=01%3A23"));
        assert_eq!(outcome.scroll_to.as_deref(), Some("intro"));
        let seek = outcome.seek.unwrap();
        assert!(seek.autoplay);
        assert_eq!(seek.seconds, 83.0);

        let player = registry.find("p1").unwrap();
        assert_eq!(player.current_time, 83.0);
        assert!(player.playing);
    }

    #[test]
    fn click_keeps_hash_when_unchanged() {
        let mut registry = registry();
        let mut jumps = JumpController::new();
        let location = Url::parse("https://docs.example/en/talks.html#p2&t=5").unwrap();
        let link = TimeLink {
            player: Some("p2".to_string()),
            time: Some("5".to_string()),
            href: Some("#p2&t=5".to_string()),
        };
        let outcome = jumps.click(&link, &location, &mut registry).unwrap();
        assert_eq!(outcome.replace_hash, None);
    }

    #[test]
    fn data_attributes_win_over_href() {
        let mut registry = registry();
        registry.mark_ready("p2");
        let mut jumps = JumpController::new();
        let link = TimeLink {
            player: Some("p2".to_string()),
            time: None,
            href: Some("#intro&t=0:30".to_string()),
        };
        let seek = jumps
            .click(&link, &page(), &mut registry)
            .unwrap()
            .seek
            .unwrap();
        assert_eq!(seek.player_id, "p2");
        assert_eq!(seek.seconds, 30.0);
    }

    #[test]
    fn click_to_other_page_does_not_touch_location() {
        let mut registry = registry();
        let mut jumps = JumpController::new();
        let link = TimeLink {
            href: Some("/en/other.html#p2&t=5".to_string()),
            ..TimeLink::default()
        };
        let outcome = jumps.click(&link, &page(), &mut registry).unwrap();
        assert!(!outcome.same_page);
        assert_eq!(outcome.replace_hash, None);
        assert_eq!(outcome.scroll_to, None);
        assert_eq!(outcome.seek, None);
        assert_eq!(
            jumps.pending(),
            Some(&PendingJump {
                player_id: "p2".to_string(),
                seconds: 5.0
            })
        );
    }

    #[test]
    fn click_without_target_is_ignored() {
        let mut registry = registry();
        let mut jumps = JumpController::new();
        let link = TimeLink {
            href: Some("#just-an-anchor".to_string()),
            ..TimeLink::default()
        };
        assert_eq!(jumps.click(&link, &page(), &mut registry), None);
    }
}
