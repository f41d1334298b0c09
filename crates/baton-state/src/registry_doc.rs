//! Text boundary for the role registry document.
//!
//! The registry lives inside a hand-written Markdown file. An assignment line
//! has the form `ROLENAME: <value>` (optionally list-bulleted) where the value
//! is either `AVAILABLE`, possibly followed by free text, or a single occupant
//! token. Lines such as `- ARCHITECT: designs the system blueprint` are prose
//! and never read or written. Everything that is not an assignment line is
//! preserved verbatim when the document is rewritten.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::schema::{Occupant, Role, RoleRegistry};

/// Heading under which roles missing from the document are appended.
pub const ROLE_SECTION_HEADING: &str = "## Role Assignments";

fn assignment_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:[-*][ \t]+)?(?P<role>[A-Z][A-Z_]*):[ \t]*(?P<value>AVAILABLE\b[^\r\n]*?|\S*)[ \t]*\r?$",
        )
        .expect("static registry pattern")
    })
}

/// One assignment line naming a known role.
struct AssignmentLine<'a> {
    role: Role,
    /// Byte range of the value within the document
    span: Range<usize>,
    value: &'a str,
}

impl AssignmentLine<'_> {
    fn occupant(&self) -> Occupant {
        Occupant::parse(self.value)
    }
}

fn assignment_lines(text: &str) -> impl Iterator<Item = AssignmentLine<'_>> {
    assignment_line().captures_iter(text).filter_map(|caps| {
        let role = caps["role"].parse::<Role>().ok()?;
        let value = caps.name("value")?;
        Some(AssignmentLine {
            role,
            span: value.range(),
            value: value.as_str(),
        })
    })
}

/// The line each role is read from: the first one naming it.
fn first_lines(text: &str) -> BTreeMap<Role, AssignmentLine<'_>> {
    let mut first = BTreeMap::new();
    for line in assignment_lines(text) {
        first.entry(line.role).or_insert(line);
    }
    first
}

/// Extract the structured registry from document text.
///
/// The first assignment line naming a role wins; lines naming unknown roles
/// are ignored.
pub fn parse_registry(text: &str) -> RoleRegistry {
    let mut registry = RoleRegistry::new();
    for (role, line) in first_lines(text) {
        registry.set(role, line.occupant());
    }
    registry
}

/// Write `registry` back into `text`.
///
/// Only the line [`parse_registry`] reads a role from is rewritten, and only
/// when the role's occupant changed. Roles with no line yet are appended under
/// [`ROLE_SECTION_HEADING`].
pub fn render_registry(text: &str, registry: &RoleRegistry) -> String {
    let lines = first_lines(text);
    let mut edits = Vec::new();
    let mut missing = Vec::new();

    for (role, occupant) in registry.entries() {
        match lines.get(&role) {
            Some(line) if &line.occupant() != occupant => {
                edits.push((line.span.clone(), occupant.as_str().to_string()));
            }
            Some(_) => {}
            None => missing.push((role, occupant.clone())),
        }
    }

    let mut out = apply_edits(text, edits);
    append_missing(&mut out, &missing);
    out
}

/// Mark every role available in `text`.
///
/// Every assignment line of every known role is rewritten, duplicates
/// included; lines already reading `AVAILABLE` are left as they are. Roles
/// with no line are appended.
pub fn reset_registry_text(text: &str) -> String {
    let mut present = Vec::new();
    let edits: Vec<(Range<usize>, String)> = assignment_lines(text)
        .inspect(|line| present.push(line.role))
        .filter(|line| !line.occupant().is_available())
        .map(|line| (line.span, Occupant::AVAILABLE.to_string()))
        .collect();

    let missing: Vec<(Role, Occupant)> = Role::ALL
        .into_iter()
        .filter(|role| !present.contains(role))
        .map(|role| (role, Occupant::Available))
        .collect();

    let mut out = apply_edits(text, edits);
    append_missing(&mut out, &missing);
    out
}

/// Replace value spans. An empty value directly after the colon gets a
/// separating space.
fn apply_edits(text: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, value) in edits {
        out.push_str(&text[cursor..span.start]);
        if span.is_empty() && text[..span.start].ends_with(':') {
            out.push(' ');
        }
        out.push_str(&value);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn append_missing(out: &mut String, missing: &[(Role, Occupant)]) {
    if missing.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.contains(ROLE_SECTION_HEADING) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(ROLE_SECTION_HEADING);
        out.push_str("\n\n");
    }
    for (role, occupant) in missing {
        out.push_str(&format!("{}: {}\n", role.as_str(), occupant.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Agent Instructions\n\
        \n\
        Claim a role before picking up work.\n\
        \n\
        ## Role Assignments\n\
        \n\
        ORCHESTRATOR: gemini-terminal\n\
        ARCHITECT: AVAILABLE\n\
        - TERRAFORM_DEVELOPER: terminal-4821\n\
        PLATFORM_ENGINEER: AVAILABLE\n\
        COMPLIANCE_ADMIN: AVAILABLE\n\
        FINOPS: AVAILABLE\n\
        \n\
        Footer text stays put.\n";

    const PROSE_FIRST: &str = "## Roles\n\
        - ARCHITECT: designs the system blueprint\n\
        \n\
        ## Role Assignments\n\
        ARCHITECT: AVAILABLE\n";

    #[test]
    fn parses_plain_and_bulleted_lines() {
        let registry = parse_registry(DOC);
        assert_eq!(registry.len(), 6);
        assert!(registry.is_available(Role::Architect));
        assert_eq!(
            registry.get(Role::TerraformDeveloper),
            Some(&Occupant::Agent("terminal-4821".to_string()))
        );
        assert_eq!(
            registry.get(Role::Orchestrator),
            Some(&Occupant::Agent("gemini-terminal".to_string()))
        );
    }

    #[test]
    fn ignores_unknown_role_lines_and_prose() {
        let registry = parse_registry("NOTE: this is prose\nJANITOR: AVAILABLE\nFINOPS: AVAILABLE\n");
        assert_eq!(registry.len(), 1);
        assert!(registry.is_available(Role::Finops));
    }

    #[test]
    fn first_line_for_a_role_wins() {
        let registry = parse_registry("ARCHITECT: terminal-1\nARCHITECT: AVAILABLE\n");
        assert!(!registry.is_available(Role::Architect));
    }

    #[test]
    fn role_named_prose_is_not_an_assignment() {
        let registry = parse_registry(PROSE_FIRST);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_available(Role::Architect));
    }

    #[test]
    fn render_skips_role_named_prose() {
        let mut registry = parse_registry(PROSE_FIRST);
        assert!(registry.occupy(Role::Architect, "terminal-1613"));

        let rendered = render_registry(PROSE_FIRST, &registry);
        assert!(rendered.contains("- ARCHITECT: designs the system blueprint\n"));
        assert!(rendered.ends_with("ARCHITECT: terminal-1613\n"));
        assert!(!rendered.contains("AVAILABLE"));
    }

    #[test]
    fn available_with_trailing_text_is_claimable() {
        let doc = "ARCHITECT: AVAILABLE (claim me)\n";
        let mut registry = parse_registry(doc);
        assert!(registry.is_available(Role::Architect));
        assert_eq!(render_registry(doc, &registry), doc);

        registry.occupy(Role::Architect, "terminal-5");
        assert_eq!(render_registry(doc, &registry), "ARCHITECT: terminal-5\n");
    }

    #[test]
    fn empty_value_holds_the_role() {
        let doc = "FINOPS:\n";
        let mut registry = parse_registry(doc);
        assert!(!registry.is_available(Role::Finops));
        assert!(!registry.occupy(Role::Finops, "terminal-1"));
        assert_eq!(render_registry(doc, &registry), doc);
    }

    #[test]
    fn claim_changes_only_the_line_that_was_read() {
        let doc = "ARCHITECT: AVAILABLE\n\nNotes\nARCHITECT: AVAILABLE\n";
        let mut registry = parse_registry(doc);
        registry.occupy(Role::Architect, "terminal-3");
        assert_eq!(
            render_registry(doc, &registry),
            "ARCHITECT: terminal-3\n\nNotes\nARCHITECT: AVAILABLE\n"
        );
    }

    #[test]
    fn render_rewrites_only_role_lines() {
        let mut registry = parse_registry(DOC);
        assert!(registry.occupy(Role::Architect, "terminal-0007"));

        let rendered = render_registry(DOC, &registry);
        assert!(rendered.contains("ARCHITECT: terminal-0007\n"));
        assert!(rendered.contains("- TERRAFORM_DEVELOPER: terminal-4821\n"));
        assert!(rendered.starts_with("# Agent Instructions\n"));
        assert!(rendered.ends_with("Footer text stays put.\n"));
        assert_eq!(rendered.lines().count(), DOC.lines().count());
    }

    #[test]
    fn render_is_identity_for_unchanged_registry() {
        let registry = parse_registry(DOC);
        assert_eq!(render_registry(DOC, &registry), DOC);
    }

    #[test]
    fn reset_marks_every_role_available() {
        let rendered = reset_registry_text(DOC);
        for role in Role::ALL {
            assert!(rendered.contains(&format!("{}: AVAILABLE", role.as_str())));
        }
        assert!(!rendered.contains("terminal-4821"));
        assert!(!rendered.contains("gemini-terminal"));
        assert_eq!(rendered.lines().count(), DOC.lines().count());
    }

    #[test]
    fn reset_rewrites_duplicate_lines() {
        let doc = "ARCHITECT: terminal-1\n\nNotes\nARCHITECT: terminal-2\n";
        let rendered = reset_registry_text(doc);
        assert!(rendered.starts_with("ARCHITECT: AVAILABLE\n\nNotes\nARCHITECT: AVAILABLE\n"));
        assert!(!rendered.contains("terminal-"));
        assert_eq!(parse_registry(&rendered), RoleRegistry::all_available());
    }

    #[test]
    fn reset_keeps_prose_and_fills_empty_values() {
        let doc = "- ARCHITECT: designs the system blueprint\nARCHITECT: terminal-9\nFINOPS:\n";
        let rendered = reset_registry_text(doc);
        assert!(rendered.starts_with(
            "- ARCHITECT: designs the system blueprint\nARCHITECT: AVAILABLE\nFINOPS: AVAILABLE\n"
        ));
        assert!(rendered.contains(ROLE_SECTION_HEADING));
        assert_eq!(parse_registry(&rendered), RoleRegistry::all_available());
    }

    #[test]
    fn render_appends_missing_roles_under_heading() {
        let registry = RoleRegistry::all_available();
        let rendered = render_registry("# Instructions\nARCHITECT: terminal-9\n", &registry);
        assert!(rendered.starts_with("# Instructions\nARCHITECT: AVAILABLE\n"));
        assert!(rendered.contains(ROLE_SECTION_HEADING));
        assert!(rendered.contains("FINOPS: AVAILABLE\n"));
        assert_eq!(parse_registry(&rendered), registry);
    }

    #[test]
    fn render_into_empty_document() {
        let registry = RoleRegistry::all_available();
        let rendered = render_registry("", &registry);
        assert!(rendered.starts_with(ROLE_SECTION_HEADING));
        assert_eq!(parse_registry(&rendered), registry);
        assert_eq!(reset_registry_text(""), rendered);
    }

    #[test]
    fn occupant_containing_dollar_is_written_literally() {
        let mut registry = RoleRegistry::all_available();
        registry.occupy(Role::Finops, "agent-$1");
        let rendered = render_registry("FINOPS: AVAILABLE\n", &registry);
        assert!(rendered.starts_with("FINOPS: agent-$1\n"));
    }
}
