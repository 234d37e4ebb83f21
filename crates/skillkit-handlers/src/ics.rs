//! Minimal RFC 5545 writer: one VCALENDAR holding one VEVENT.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use skillkit_core::{Result, SkillkitError};

pub const PRODID: &str = "-//Calendar Assistant Agent Skill//EN";
pub const UID_DOMAIN: &str = "calendar-assistant-skill";

const MAX_LINE_OCTETS: usize = 75;

/// A person on an event (organizer or attendee).
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub email: String,
    pub name: Option<String>,
    /// Attendee role, e.g. "REQ-PARTICIPANT". Unused for organizers.
    pub role: Option<String>,
}

/// A fully resolved calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Tz>,
    pub duration: Duration,
    pub organizer: Option<Participant>,
    pub attendees: Vec<Participant>,
    /// Reminder lead time in hours; `<= 0` disables the alarm.
    pub reminder_hours: f64,
}

impl CalendarEvent {
    /// `None` when the duration runs past the representable range.
    pub fn end(&self) -> Option<DateTime<Tz>> {
        self.start.checked_add_signed(self.duration)
    }

    /// Stable identifier derived from summary and start.
    pub fn uid(&self) -> String {
        let base = format!("{}{}", self.summary, self.start.to_rfc3339());
        let hash = blake3::hash(base.as_bytes()).to_hex();
        format!("{}@{UID_DOMAIN}", &hash.as_str()[..32])
    }
}

/// Render `event` as an iCalendar document (CRLF line endings, folded).
pub fn build_ics(event: &CalendarEvent, dtstamp: DateTime<Utc>) -> Result<Vec<u8>> {
    let end = event
        .end()
        .ok_or_else(|| SkillkitError::Calendar("event end is out of range".into()))?;
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".into(),
        format!("PRODID:{PRODID}"),
        "VERSION:2.0".into(),
        "CALSCALE:GREGORIAN".into(),
        "BEGIN:VEVENT".into(),
        format!("SUMMARY:{}", escape_text(&event.summary)),
        format!("DTSTART:{}", utc_stamp(event.start.with_timezone(&Utc))),
        format!("DTEND:{}", utc_stamp(end.with_timezone(&Utc))),
        format!("DTSTAMP:{}", utc_stamp(dtstamp)),
        format!("UID:{}", event.uid()),
    ];

    if let Some(location) = event.location.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(description) = event.description.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(org) = event.organizer.as_ref().filter(|o| !o.email.is_empty()) {
        let cn = org
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|n| format!(";CN={}", param_value(n)))
            .unwrap_or_default();
        lines.push(format!("ORGANIZER{cn}:mailto:{}", org.email));
    }
    for att in event.attendees.iter().filter(|a| !a.email.is_empty()) {
        let cn = att.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&att.email);
        let role = att.role.as_deref().unwrap_or("REQ-PARTICIPANT");
        lines.push(format!(
            "ATTENDEE;CN={};ROLE={role}:mailto:{}",
            param_value(cn),
            att.email
        ));
    }
    if event.reminder_hours > 0.0 {
        lines.push("BEGIN:VALARM".into());
        lines.push("ACTION:DISPLAY".into());
        lines.push(format!("TRIGGER:{}", reminder_trigger(event.reminder_hours)));
        lines.push(format!("DESCRIPTION:{}", escape_text(&format!("Reminder: {}", event.summary))));
        lines.push("END:VALARM".into());
    }
    lines.push("END:VEVENT".into());
    lines.push("END:VCALENDAR".into());

    let mut out = String::new();
    for line in &lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    Ok(out.into_bytes())
}

fn utc_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Negative duration for a VALARM trigger, e.g. `-PT1H`, `-PT30M`, `-PT1H30M`.
pub fn reminder_trigger(hours: f64) -> String {
    let minutes = (hours * 60.0).round() as i64;
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("-PT{m}M"),
        (h, 0) => format!("-PT{h}H"),
        (h, m) => format!("-PT{h}H{m}M"),
    }
}

/// Escape a TEXT value: backslash, semicolon, comma and newlines.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Parameter values containing `:;,` must be quoted; quotes are dropped.
fn param_value(s: &str) -> String {
    let s = s.replace('"', "");
    if s.contains([':', ';', ',']) {
        format!("\"{s}\"")
    } else {
        s
    }
}

/// Fold a content line to at most 75 octets per physical line, never
/// splitting a UTF-8 sequence. Continuation lines start with one space.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut current = 0usize;
    // The first line holds 75 octets; continuations hold 74 plus the space.
    let mut limit = MAX_LINE_OCTETS;
    for c in line.chars() {
        let w = c.len_utf8();
        if current + w > limit {
            out.push_str("\r\n ");
            current = 0;
            limit = MAX_LINE_OCTETS - 1;
        }
        out.push(c);
        current += w;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> CalendarEvent {
        CalendarEvent {
            summary: "Team Meeting - Q4 Planning".into(),
            description: Some("Agenda: budget, hiring; roadmap".into()),
            location: Some("Room 4".into()),
            start: chrono_tz::America::New_York
                .with_ymd_and_hms(2025, 3, 14, 14, 0, 0)
                .unwrap(),
            duration: Duration::hours(2),
            organizer: Some(Participant {
                email: "ana@example.com".into(),
                name: Some("Ana".into()),
                role: None,
            }),
            attendees: vec![Participant {
                email: "bo@example.com".into(),
                name: None,
                role: None,
            }],
            reminder_hours: 1.0,
        }
    }

    fn render(e: &CalendarEvent) -> String {
        let stamp = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        String::from_utf8(build_ics(e, stamp).unwrap()).unwrap()
    }

    #[test]
    fn test_renders_calendar_skeleton() {
        let ics = render(&event());
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nPRODID:-//Calendar Assistant Agent Skill//EN\r\nVERSION:2.0\r\nCALSCALE:GREGORIAN\r\n"));
        assert!(ics.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
        assert!(ics.contains("SUMMARY:Team Meeting - Q4 Planning\r\n"));
        // 14:00 EDT = 18:00 UTC
        assert!(ics.contains("DTSTART:20250314T180000Z\r\n"));
        assert!(ics.contains("DTEND:20250314T200000Z\r\n"));
        assert!(ics.contains("DTSTAMP:20250301T080000Z\r\n"));
        assert!(ics.contains("LOCATION:Room 4\r\n"));
        assert!(ics.contains("DESCRIPTION:Agenda: budget\\, hiring\\; roadmap\r\n"));
        assert!(ics.contains("ORGANIZER;CN=Ana:mailto:ana@example.com\r\n"));
        assert!(ics.contains("ATTENDEE;CN=bo@example.com;ROLE=REQ-PARTICIPANT:mailto:bo@example.com\r\n"));
        assert!(ics.contains("BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT1H\r\n"));
        assert!(!ics.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_uid_is_stable_and_scoped() {
        let e = event();
        assert_eq!(e.uid(), event().uid());
        assert!(e.uid().ends_with("@calendar-assistant-skill"));
        let mut other = event();
        other.summary = "Something else".into();
        assert_ne!(e.uid(), other.uid());
    }

    #[test]
    fn test_optional_parts_omitted() {
        let mut e = event();
        e.location = None;
        e.description = Some(String::new());
        e.organizer = None;
        e.attendees.clear();
        e.reminder_hours = 0.0;
        let ics = render(&e);
        assert!(!ics.contains("LOCATION"));
        assert!(!ics.contains("DESCRIPTION"));
        assert!(!ics.contains("ORGANIZER"));
        assert!(!ics.contains("VALARM"));
    }

    #[test]
    fn test_reminder_triggers() {
        assert_eq!(reminder_trigger(1.0), "-PT1H");
        assert_eq!(reminder_trigger(0.5), "-PT30M");
        assert_eq!(reminder_trigger(1.5), "-PT1H30M");
        assert_eq!(reminder_trigger(24.0), "-PT24H");
    }

    #[test]
    fn test_escapes_text() {
        assert_eq!(escape_text("a,b;c\\d\nline"), "a\\,b\\;c\\\\d\\nline");
    }

    #[test]
    fn test_folds_long_lines_on_char_boundaries() {
        let line = format!("DESCRIPTION:{}", "é".repeat(60));
        let folded = fold_line(&line);
        for (i, part) in folded.split("\r\n").enumerate() {
            assert!(part.len() <= 75, "line {i} is {} octets", part.len());
            if i > 0 {
                assert!(part.starts_with(' '));
            }
        }
        let unfolded = folded.replace("\r\n ", "");
        assert_eq!(unfolded, line);
    }

    #[test]
    fn test_short_lines_untouched() {
        assert_eq!(fold_line("VERSION:2.0"), "VERSION:2.0");
    }

    #[test]
    fn test_quotes_parameter_values_with_separators() {
        let mut e = event();
        e.organizer = Some(Participant {
            email: "x@example.com".into(),
            name: Some("Doe, Jane".into()),
            role: None,
        });
        assert!(render(&e).contains("ORGANIZER;CN=\"Doe, Jane\":mailto:x@example.com"));
    }

    #[test]
    fn test_out_of_range_end_is_an_error() {
        let mut e = event();
        e.duration = Duration::MAX;
        assert!(e.end().is_none());
        let err = build_ics(&e, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "calendar");
    }
}
