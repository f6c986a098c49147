// tests/stations_file.rs
//
// The bundled roster under config/ must load cleanly and keep opaque ids.

use gauge_dashboard::config::DashboardConfig;
use gauge_dashboard::stations::StationRegistry;

#[test]
fn bundled_station_list_loads() {
    let cfg = DashboardConfig::default();
    let reg = StationRegistry::load_from_path(&cfg.stations_path).expect("load roster");

    assert!(!reg.is_empty());
    assert_eq!(reg.dropped().len(), 1, "only the header row is dropped");
    assert!(reg.get("03207965").is_some(), "leading zero preserved");
    assert!(reg.get("3207965").is_none());
    assert!(reg.get("371144082383401").is_some(), "long ids are not truncated");

    for s in reg.stations() {
        assert!((-90.0..=90.0).contains(&s.lat), "{} lat", s.id);
        assert!((-180.0..=180.0).contains(&s.lon), "{} lon", s.id);
        assert!(!s.name.trim().is_empty());
    }
}
