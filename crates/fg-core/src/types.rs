//! Core type definitions for FilterGate
//!
//! Bit sets shared by requests, rules and the matching result.

/// Opaque location of a rule inside the external rule storage.
pub type StorageIndex = u32;

// =============================================================================
// Request Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    ///
    /// A request carries exactly one bit; a rule carries the set of types it
    /// applies to.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u32 {
        /// Main frame document
        const DOCUMENT = 1 << 0;
        /// iframe/frame
        const SUBDOCUMENT = 1 << 1;
        const SCRIPT = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const IMAGE = 1 << 5;
        const XMLHTTPREQUEST = 1 << 6;
        const MEDIA = 1 << 7;
        const FONT = 1 << 8;
        const WEBSOCKET = 1 << 9;
        const PING = 1 << 10;
        const CSP_REPORT = 1 << 11;
        const OTHER = 1 << 12;

        /// All request types
        const ALL = (1 << 13) - 1;
        /// Frame types (main_frame + sub_frame)
        const FRAMES = Self::DOCUMENT.bits() | Self::SUBDOCUMENT.bits();
    }
}

impl RequestType {
    /// Parse from a browser request type string.
    ///
    /// Unknown names map to `OTHER`.
    pub fn parse_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "document" | "main_frame" => Self::DOCUMENT,
            "subdocument" | "sub_frame" => Self::SUBDOCUMENT,
            "script" => Self::SCRIPT,
            "stylesheet" => Self::STYLESHEET,
            "object" => Self::OBJECT,
            "image" => Self::IMAGE,
            "xmlhttprequest" | "xhr" | "fetch" => Self::XMLHTTPREQUEST,
            "media" => Self::MEDIA,
            "font" => Self::FONT,
            "websocket" => Self::WEBSOCKET,
            "ping" | "beacon" => Self::PING,
            "csp_report" => Self::CSP_REPORT,
            _ => Self::OTHER,
        }
    }
}

// =============================================================================
// HTTP Methods
// =============================================================================

bitflags::bitflags! {
    /// HTTP method mask used by `$method`.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HttpMethod: u16 {
        const GET = 1 << 0;
        const POST = 1 << 1;
        const PUT = 1 << 2;
        const DELETE = 1 << 3;
        const HEAD = 1 << 4;
        const OPTIONS = 1 << 5;
        const PATCH = 1 << 6;
        const CONNECT = 1 << 7;
        const TRACE = 1 << 8;
    }
}

impl HttpMethod {
    /// Parse a method name, case-insensitively.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Self::GET),
            "post" => Some(Self::POST),
            "put" => Some(Self::PUT),
            "delete" => Some(Self::DELETE),
            "head" => Some(Self::HEAD),
            "options" => Some(Self::OPTIONS),
            "patch" => Some(Self::PATCH),
            "connect" => Some(Self::CONNECT),
            "trace" => Some(Self::TRACE),
            _ => None,
        }
    }
}

// =============================================================================
// Rule Options (modifier bit set exposed by rule handles)
// =============================================================================

bitflags::bitflags! {
    /// Modifiers enabled on a network rule.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NetworkRuleOption: u32 {
        /// $third-party
        const THIRD_PARTY = 1 << 0;
        /// $~third-party / $first-party
        const FIRST_PARTY = 1 << 1;
        /// $match-case
        const MATCH_CASE = 1 << 2;
        /// $important - ignores non-important exceptions
        const IMPORTANT = 1 << 3;
        /// $badfilter - cancels an otherwise identical rule
        const BADFILTER = 1 << 4;
        /// $popup
        const POPUP = 1 << 5;

        // Document-level exception modifiers
        const ELEMHIDE = 1 << 6;
        const GENERICHIDE = 1 << 7;
        const SPECIFICHIDE = 1 << 8;
        const GENERICBLOCK = 1 << 9;
        const JSINJECT = 1 << 10;
        const URLBLOCK = 1 << 11;
        const CONTENT = 1 << 12;
        const DOCUMENT = 1 << 13;

        // Advanced modifiers (carry a value)
        const STEALTH = 1 << 14;
        const CSP = 1 << 15;
        const COOKIE = 1 << 16;
        const REPLACE = 1 << 17;
        const REMOVEPARAM = 1 << 18;
        const REMOVEHEADER = 1 << 19;
        const PERMISSIONS = 1 << 20;
        const REDIRECT = 1 << 21;
        const REDIRECT_RULE = 1 << 22;
        const HEADER = 1 << 23;

        /// Modifiers that make an allowlist rule apply to the whole frame.
        const DOCUMENT_LEVEL = Self::DOCUMENT.bits()
            | Self::URLBLOCK.bits()
            | Self::GENERICBLOCK.bits()
            | Self::GENERICHIDE.bits()
            | Self::SPECIFICHIDE.bits()
            | Self::ELEMHIDE.bits()
            | Self::CONTENT.bits()
            | Self::JSINJECT.bits();
        /// Modifiers that only narrow cosmetic capabilities.
        const COSMETIC_EXCEPTIONS = Self::ELEMHIDE.bits()
            | Self::GENERICHIDE.bits()
            | Self::SPECIFICHIDE.bits()
            | Self::JSINJECT.bits()
            | Self::CONTENT.bits();
        /// Modifiers that switch request filtering off entirely.
        const FILTERING_DISABLED = Self::DOCUMENT.bits() | Self::URLBLOCK.bits();
        /// Modifiers routed into a per-category result list.
        const ADVANCED = Self::STEALTH.bits()
            | Self::CSP.bits()
            | Self::COOKIE.bits()
            | Self::REPLACE.bits()
            | Self::REMOVEPARAM.bits()
            | Self::REMOVEHEADER.bits()
            | Self::PERMISSIONS.bits()
            | Self::REDIRECT.bits()
            | Self::REDIRECT_RULE.bits()
            | Self::HEADER.bits();
    }
}

// =============================================================================
// Cosmetic Options
// =============================================================================

bitflags::bitflags! {
    /// Cosmetic capabilities a page is permitted to use.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CosmeticOption: u8 {
        const GENERIC_CSS = 1 << 0;
        const SPECIFIC_CSS = 1 << 1;
        const JS = 1 << 2;
        const HTML = 1 << 3;

        const ALL = Self::GENERIC_CSS.bits()
            | Self::SPECIFIC_CSS.bits()
            | Self::JS.bits()
            | Self::HTML.bits();
    }
}

impl CosmeticOption {
    /// No cosmetic capability left.
    pub const NONE: Self = Self::empty();

    /// Narrow this mask by the cosmetic exception modifiers in `options`.
    pub fn narrowed_by(self, options: NetworkRuleOption) -> Self {
        if options.contains(NetworkRuleOption::DOCUMENT) {
            return Self::NONE;
        }

        let mut mask = self;
        if options.contains(NetworkRuleOption::ELEMHIDE) {
            mask.remove(Self::GENERIC_CSS | Self::SPECIFIC_CSS);
        }
        if options.contains(NetworkRuleOption::GENERICHIDE) {
            mask.remove(Self::GENERIC_CSS);
        }
        if options.contains(NetworkRuleOption::SPECIFICHIDE) {
            mask.remove(Self::SPECIFIC_CSS);
        }
        if options.contains(NetworkRuleOption::JSINJECT) {
            mask.remove(Self::JS);
        }
        if options.contains(NetworkRuleOption::CONTENT) {
            mask.remove(Self::HTML);
        }
        mask
    }
}
