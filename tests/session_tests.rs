use bookreader::history::ReadingHistory;
use bookreader::layout::Surface;
use bookreader::render::fit_dimensions;
use bookreader::settings::SettingsStore;
use bookreader::test_utils::SyntheticSource;
use bookreader::view::{DISABLE_CONTINUOUS_FIRST, DISABLE_FACING_FIRST, ScrollOffset};
use bookreader::{DocumentKind, LayoutMode, Notification, PageSize, Session, Viewport};

fn new_session(width: u32, height: u32) -> Session {
    Session::new(
        SettingsStore::ephemeral(),
        ReadingHistory::ephemeral(),
        Viewport::new(width, height),
    )
}

fn open_pages(session: &mut Session, kind: DocumentKind, pages: usize, size: PageSize) {
    let source = SyntheticSource::new(kind, pages, size);
    assert!(session.open_source(Box::new(source)));
}

#[test]
fn navigation_stays_inside_the_document() {
    let mut session = new_session(300, 300);
    open_pages(&mut session, DocumentKind::Djvu, 10, PageSize::new(100.0, 150.0));

    session.prev_page();
    assert_eq!(session.state().current_page, 0);

    session.go_to_page(99);
    assert_eq!(session.state().current_page, 9);

    session.next_page();
    assert_eq!(session.state().current_page, 9);

    session.prev_page();
    assert_eq!(session.state().current_page, 8);
    assert!(matches!(session.surface(), Surface::Single(page) if page.page == 8));
}

#[test]
fn facing_spread_pairs_even_and_odd_pages() {
    let mut session = new_session(600, 400);
    open_pages(&mut session, DocumentKind::Pdf, 10, PageSize::new(200.0, 300.0));

    session.set_facing(true);
    session.go_to_page(5);

    let Surface::Facing(spread) = session.surface() else {
        panic!("expected a facing spread");
    };
    assert_eq!(spread.left, 4);
    assert_eq!(spread.right, Some(5));
    assert!(spread.bitmap.width <= 600 && spread.bitmap.height <= 400);

    session.next_page();
    assert_eq!(session.state().current_page, 7);
}

#[test]
fn facing_last_odd_page_stands_alone() {
    let mut session = new_session(600, 400);
    open_pages(&mut session, DocumentKind::Djvu, 5, PageSize::new(200.0, 300.0));

    session.set_facing(true);
    session.go_to_page(4);

    let Surface::Facing(spread) = session.surface() else {
        panic!("expected a facing spread");
    };
    assert_eq!((spread.left, spread.right), (4, None));
}

#[test]
fn conflicting_layout_request_posts_one_notice() {
    let mut session = new_session(400, 300);
    open_pages(&mut session, DocumentKind::Djvu, 4, PageSize::new(100.0, 100.0));

    session.set_continuous(true);
    session.set_facing(true);
    assert_eq!(session.state().layout, LayoutMode::Continuous);
    assert_eq!(
        session.take_notices(),
        vec![Notification::info(DISABLE_CONTINUOUS_FIRST)]
    );

    session.set_continuous(false);
    session.set_facing(true);
    session.set_continuous(true);
    assert_eq!(session.state().layout, LayoutMode::Facing);
    assert_eq!(
        session.take_notices(),
        vec![Notification::info(DISABLE_FACING_FIRST)]
    );
}

#[test]
fn zoom_in_then_out_restores_zoom_and_focal_point() {
    let mut session = new_session(400, 300);
    open_pages(&mut session, DocumentKind::Pdf, 1, PageSize::new(800.0, 1200.0));

    for _ in 0..10 {
        session.zoom_in();
    }
    let zoom = session.state().zoom;
    session.scroll_to(ScrollOffset::new(50, 200));
    assert_eq!(session.scroll(), ScrollOffset::new(50, 200));

    session.zoom_in();
    assert!(session.surface().size().1 > 778);
    session.zoom_out();

    assert!((session.state().zoom - zoom).abs() < 1e-4);
    let scroll = session.scroll();
    assert!(scroll.x.abs_diff(50) <= 1, "x drifted to {}", scroll.x);
    assert!(scroll.y.abs_diff(200) <= 1, "y drifted to {}", scroll.y);
}

#[test]
fn fit_to_window_matches_fit_dimensions() {
    let sizes = [(612.0, 792.0), (2550.0, 3300.0), (1200.0, 400.0), (37.0, 91.0)];
    let viewports = [(640, 480), (300, 900), (1920, 1080), (51, 49)];

    for (w, h) in sizes {
        for (vw, vh) in viewports {
            let mut session = new_session(vw, vh);
            open_pages(&mut session, DocumentKind::Djvu, 1, PageSize::new(w, h));

            let expected = fit_dimensions((w as u32, h as u32), (vw, vh)).unwrap();
            let (rw, rh) = session.surface().size();
            assert_eq!((rw, rh), expected, "page {w}x{h} in {vw}x{vh}");
            assert!(rw <= vw && rh <= vh);
            assert!(rw == vw || rh == vh);
        }
    }
}

#[test]
fn continuous_render_can_be_cancelled_between_pages() {
    let mut session = new_session(220, 300);
    open_pages(&mut session, DocumentKind::Djvu, 6, PageSize::new(100.0, 100.0));
    session.set_continuous(true);

    let cancel = session.render_cancel_token();
    let mut seen = Vec::new();
    session.rerender_with_progress(&mut |done, _| {
        seen.push(done);
        if done == 2 {
            cancel.cancel();
        }
    });

    let Surface::Continuous(strip) = session.surface() else {
        panic!("expected a continuous strip");
    };
    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(strip.pages.len(), 2);
    assert!(!strip.complete);

    session.rerender_with_progress(&mut |_, _| {});
    let Surface::Continuous(strip) = session.surface() else {
        panic!("expected a continuous strip");
    };
    assert_eq!(strip.pages.len(), 6);
}

#[test]
fn scrolling_a_continuous_strip_updates_current_page() {
    let mut session = new_session(220, 300);
    open_pages(&mut session, DocumentKind::Djvu, 5, PageSize::new(100.0, 100.0));
    session.set_continuous(true);

    let Surface::Continuous(strip) = session.surface() else {
        panic!("expected a continuous strip");
    };
    let third = strip.offset_of(2).unwrap();
    session.scroll_to(ScrollOffset::new(0, third + 5));
    assert_eq!(session.state().current_page, 2);
}

#[test]
fn export_writes_one_pdf_page_per_djvu_page() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut session = new_session(400, 300);
    let source = SyntheticSource::new(DocumentKind::Djvu, 3, PageSize::new(120.0, 160.0))
        .with_path(dir.path().join("scan.djvu"));
    session.open_source(Box::new(source));

    let summary = session.export_pdf(None, &mut |_, _| {}).unwrap();
    assert_eq!(summary.path, dir.path().join("scan.pdf"));
    assert_eq!(lopdf::Document::load(&summary.path).unwrap().get_pages().len(), 3);
    assert_eq!(
        session.take_notices(),
        vec![Notification::info(bookreader::export::EXPORT_DONE)]
    );
}

#[test]
fn export_is_refused_for_pdf_and_without_a_document() {
    let mut session = new_session(400, 300);
    assert!(session.export_pdf(None, &mut |_, _| {}).is_none());

    open_pages(&mut session, DocumentKind::Pdf, 2, PageSize::new(100.0, 100.0));
    assert!(session.export_pdf(None, &mut |_, _| {}).is_none());

    let messages: Vec<String> = session.take_notices().into_iter().map(|n| n.message).collect();
    assert_eq!(
        messages,
        vec![bookreader::export::NO_FILE_OPEN, bookreader::export::NOT_DJVU]
    );
}
