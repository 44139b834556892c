use gradescan::capture::handoff::HandoffChannel;

fn channel() -> HandoffChannel {
    HandoffChannel::new(
        "https://grade.example/scan.html".into(),
        "https://grade.example/multi-scan.html".into(),
    )
}

#[test]
fn token_rides_as_query_parameter() {
    let url = channel().share_url("tok-123");
    assert_eq!(url, "https://grade.example/scan.html?token=tok-123");
}

#[test]
fn roster_url_uses_multi_page() {
    let url = channel().roster_share_url("tok-456");
    assert_eq!(url, "https://grade.example/multi-scan.html?token=tok-456");
}

#[test]
fn qr_payload_is_the_share_url() {
    let ch = channel();
    assert_eq!(ch.qr_payload("t"), ch.share_url("t").into_bytes());
    assert_eq!(
        ch.roster_qr_payload("t"),
        ch.roster_share_url("t").into_bytes()
    );
}
