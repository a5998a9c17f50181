use super::*;

#[test]
fn feed_renders_plain_text() {
    let mut screen = Screen::new(20, 5);
    screen.feed(b"hello");
    let snap = screen.snapshot();
    assert!(snap.lines[0].starts_with("hello"));
}

#[test]
fn split_ansi_sequence_across_two_feeds_is_interpreted_correctly() {
    // "a", ESC, "[", "3" in one chunk, "1m", "b" in the next (spec scenario 5).
    let mut screen = Screen::new(20, 5);
    screen.feed(b"a\x1b[3");
    screen.feed(b"1mb");
    let snap = screen.snapshot();
    assert!(snap.lines[0].starts_with("ab"));
}

#[test]
fn split_utf8_codepoint_across_two_feeds_renders_correctly() {
    // 'é' = 0xC3 0xA9
    let mut screen = Screen::new(20, 5);
    screen.feed(&[0xC3]);
    screen.feed(&[0xA9]);
    let snap = screen.snapshot();
    assert!(snap.lines[0].starts_with('\u{e9}'));
}

#[test]
fn alt_screen_toggles_on_decset_and_decrst() {
    let mut screen = Screen::new(20, 5);
    assert!(!screen.is_alt_screen());
    screen.feed(ALT_SCREEN_ON);
    assert!(screen.is_alt_screen());
    screen.feed(ALT_SCREEN_OFF);
    assert!(!screen.is_alt_screen());
}

#[test]
fn changed_flag_clears_and_sequence_increments() {
    let mut screen = Screen::new(20, 5);
    assert!(!screen.changed());
    screen.feed(b"x");
    assert!(screen.changed());
    assert_eq!(screen.seq(), 1);
    screen.clear_changed();
    assert!(!screen.changed());
}
