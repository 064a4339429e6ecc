mod common;
use std::io::Write;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array2;
use tempfile::TempDir;
use tfanova::fiff::{write_events_fif, write_events_to};
use tfanova::{
    epochs_from_events, pick_events, read_events, ChannelKind, DropReason, EpochConfig,
    EqualizeMethod, Event, EventId,
};

fn ev(sample: i64, id: i32) -> Event {
    Event { sample, prev: 0, id }
}

fn audvis() -> EventId {
    EventId::parse_mapping("aud_l:1;vis_l:3").unwrap()
}

#[test]
fn fif_and_text_files_agree() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let events = vec![ev(25800, 0), ev(27977, 2), ev(28345, 3), ev(28771, 1), ev(29219, 4)];

    let fif = tmp.path().join("events-eve.fif");
    write_events_fif(&fif, &events, Some(&audvis())).unwrap();
    let from_fif = read_events(&fif).unwrap();

    let txt = tmp.path().join("events.eve");
    let body: String = events
        .iter()
        .map(|e| format!("{} {:.3} {} {}\n", e.sample, e.sample as f64 / 150.15, e.prev, e.id))
        .collect();
    std::fs::write(&txt, body).unwrap();
    let from_txt = read_events(&txt).unwrap();

    assert_eq!(from_fif, events);
    assert_eq!(from_txt, events);
    assert_eq!(pick_events(&from_fif, &[1, 3]).len(), 2);
}

#[test]
fn gzipped_fif_events() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let events = vec![ev(6994, 2), ev(7086, 3), ev(7192, 1)];

    let mut raw = Vec::new();
    write_events_to(&mut raw, &events, Some(&audvis())).unwrap();
    let path = tmp.path().join("events-eve.fif.gz");
    let mut enc = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    enc.write_all(&raw).unwrap();
    enc.finish().unwrap();

    assert_eq!(read_events(&path).unwrap(), events);
}

#[test]
fn empty_text_file_is_an_error() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let txt = tmp.path().join("empty.eve");
    std::fs::write(&txt, "\n").unwrap();
    assert!(read_events(&txt).is_err());
}

#[test]
fn missing_file_reports_path() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let err = read_events(tmp.path().join("does-not-exist.eve")).unwrap_err();
    assert!(format!("{err:#}").contains("does-not-exist"));
}

#[test]
fn epoch_then_equalize_by_time() {
    let data = Array2::from_shape_fn((2, 700), |(c, t)| (c * 1000 + t) as f64 * 1e-6);
    let kinds = [ChannelKind::Eeg, ChannelKind::Eog];
    let events = [
        ev(100, 1), ev(110, 3), ev(290, 3), ev(300, 1),
        ev(400, 3), ev(500, 1), ev(520, 3), ev(696, 1),
    ];
    let cfg = EpochConfig { tmin: -0.02, tmax: 0.05, baseline: None, reject: Vec::new() };
    let mut epochs = epochs_from_events(data.view(), 0, 100.0, &kinds, &events, &audvis(), &cfg).unwrap();

    // the last aud_l event runs off the end of the recording
    assert_eq!(epochs.len(), 7);
    assert_eq!(epochs.drop_log, vec![(ev(696, 1), DropReason::NoData)]);

    let dropped = epochs.equalize_event_counts(EqualizeMethod::MinTime).unwrap();
    assert_eq!(dropped, vec![vec![], vec![4]]);
    assert_eq!(epochs.select("aud_l").unwrap().len(), 3);
    let vis = epochs.select("vis_l").unwrap();
    let samples: Vec<i64> = vis.events.iter().map(|e| e.sample).collect();
    assert_eq!(samples, vec![110, 290, 520]);
    assert_eq!(vis.data.shape(), &[3, 2, 8]);
}

#[test]
fn default_rejection_uses_eog_limit() {
    let mut data = Array2::<f64>::zeros((2, 300));
    data[[1, 150]] = 1e-3;
    let kinds = [ChannelKind::Grad, ChannelKind::Eog];
    let cfg = EpochConfig { tmin: -0.05, tmax: 0.05, ..EpochConfig::default() };
    let epochs = epochs_from_events(
        data.view(), 0, 1000.0, &kinds, &[ev(60, 1), ev(150, 3)], &audvis(), &cfg,
    )
    .unwrap();
    assert_eq!(epochs.events, vec![ev(60, 1)]);
    assert!(matches!(&epochs.drop_log[0].1, DropReason::Rejected(k) if k == &[ChannelKind::Eog]));
}
