use super::*;

fn path(value: &str) -> PathId {
    PathId::from(value)
}

fn tabbed_with(pages: &[&str]) -> ContentPanel {
    let mut panel = ContentPanel::new(true);
    for page in pages {
        panel.add_content(path(page));
    }
    panel
}

#[test]
fn adding_known_page_only_switches_current() {
    let mut panel = tabbed_with(&["/home", "/acct", "/ledger"]);
    assert!(panel.add_content(path("/acct")).is_empty());
    assert_eq!(panel.len(), 3);
    assert_eq!(panel.current_page(), Some(&path("/acct")));
}

#[test]
fn untabbed_panel_discards_previous_pages() {
    let mut panel = ContentPanel::new(false);
    panel.add_content(path("/home"));
    let discarded = panel.add_content(path("/acct"));
    assert_eq!(discarded, vec![path("/home")]);
    assert_eq!(panel.pages(), &[path("/acct")]);
}

#[test]
fn insert_replaces_current_position() {
    let mut panel = tabbed_with(&["/home", "/acct"]);
    let (replaced, discarded) = panel.insert_content(path("/ledger"));
    assert_eq!(replaced, Some(path("/acct")));
    assert!(discarded.is_empty());
    assert_eq!(panel.pages(), &[path("/home"), path("/ledger"), path("/acct")]);
    assert_eq!(panel.current_page(), Some(&path("/ledger")));
}

#[test]
fn insert_into_short_panel_appends() {
    let mut panel = tabbed_with(&["/home"]);
    let (replaced, _) = panel.insert_content(path("/acct"));
    assert_eq!(replaced, None);
    assert_eq!(panel.pages(), &[path("/home"), path("/acct")]);
}

#[test]
fn close_evaluates_only_the_page_itself() {
    let panel = tabbed_with(&["/home", "/acct", "/ledger"]);
    assert_eq!(
        panel.evaluate_remove_content(&path("/acct"), ClosePageMode::Close),
        vec![path("/acct")]
    );
}

#[test]
fn close_of_page_outside_panel_is_empty() {
    let panel = tabbed_with(&["/home", "/acct"]);
    assert!(panel
        .evaluate_remove_content(&path("/popup"), ClosePageMode::Close)
        .is_empty());
}

#[test]
fn close_others_spares_home_and_self() {
    let panel = tabbed_with(&["/home", "/acct", "/ledger", "/audit"]);
    assert_eq!(
        panel.evaluate_remove_content(&path("/ledger"), ClosePageMode::CloseOthers),
        vec![path("/acct"), path("/audit")]
    );
}

#[test]
fn close_all_includes_self_last() {
    let panel = tabbed_with(&["/home", "/acct", "/ledger"]);
    assert_eq!(
        panel.evaluate_remove_content(&path("/acct"), ClosePageMode::CloseAll),
        vec![path("/ledger"), path("/acct")]
    );
}

#[test]
fn remove_content_keeps_current_in_range() {
    let mut panel = tabbed_with(&["/home", "/acct", "/ledger"]);
    panel.remove_content(&[path("/ledger"), path("/missing")]);
    assert_eq!(panel.pages(), &[path("/home"), path("/acct")]);
    assert_eq!(panel.current_page(), Some(&path("/acct")));
}
