//! End-to-end scenarios exercised against a live [`crate::Hub`] through
//! its public facades only.

use std::cell::RefCell;
use std::rc::Rc;

use hub_types::{DataValue, HubError, SampleType};

use crate::hub::{ObservationConfig, Stat};
use crate::snapshot::{Format, SnapshotFlags, BEGINNING_OF_TIME};
use crate::Hub;

#[test]
fn trigger_propagates_from_input_through_observation_to_output() {
    let hub = Hub::new();
    hub.io().create_input("/sensors/door", SampleType::Trigger, "").unwrap();
    hub.admin().create_observation("/obs/door").unwrap();
    hub.io().create_output("/alerts/door", SampleType::Trigger, "", false).unwrap();

    hub.admin().set_source("/obs/door", "/sensors/door").unwrap();
    hub.admin().set_source("/alerts/door", "/obs/door").unwrap();

    hub.io().push_trigger("/sensors/door", 1.0).unwrap();

    assert_eq!(hub.query().get_current("/alerts/door").unwrap().sample_type(), SampleType::Trigger);
    assert_eq!(hub.query().get_current("/alerts/door").unwrap().timestamp(), 1.0);
}

#[test]
fn numeric_handler_on_a_trigger_input_receives_nan() {
    let hub = Hub::new();
    hub.io().create_input("/app/a/t", SampleType::Trigger, "").unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    hub.io()
        .add_push_handler(
            "/app/a/t",
            SampleType::Numeric,
            Rc::new(move |sample| s.borrow_mut().push((sample.timestamp(), sample.value().clone()))),
        )
        .unwrap();

    hub.io().push_trigger("/app/a/t", 1000.0).unwrap();

    let calls = seen.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 1000.0);
    match calls[0].1 {
        DataValue::Numeric(v) => assert!(v.is_nan()),
        ref other => panic!("expected numeric NaN, got {other:?}"),
    }
}

#[test]
fn unit_mismatch_drops_downstream_propagation_but_keeps_the_source() {
    let hub = Hub::new();
    hub.io().create_input("/sensors/temp", SampleType::Numeric, "celsius").unwrap();
    hub.io().create_output("/display/temp", SampleType::Numeric, "fahrenheit", false).unwrap();
    hub.admin().set_source("/display/temp", "/sensors/temp").unwrap();

    hub.io().push_numeric("/sensors/temp", 1.0, 20.0).unwrap();

    assert_eq!(hub.query().get_current("/sensors/temp").unwrap().value(), &DataValue::Numeric(20.0));
    assert_eq!(hub.query().get_current("/display/temp"), Err(HubError::Unavailable));
}

#[test]
fn change_by_filter_rejects_small_deltas() {
    let hub = Hub::new();
    hub.admin().create_observation("/avg/pressure").unwrap();
    hub.admin()
        .configure_observation(
            "/avg/pressure",
            ObservationConfig { change_by: Some(1.0), buffer_max: Some(10), ..Default::default() },
        )
        .unwrap();

    hub.io().push_numeric("/avg/pressure", 1.0, 100.0).unwrap();
    hub.io().push_numeric("/avg/pressure", 2.0, 100.5).unwrap(); // rejected, too close
    hub.io().push_numeric("/avg/pressure", 3.0, 102.0).unwrap(); // accepted

    let buffer = hub.query().get_buffer("/avg/pressure").unwrap();
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer[1].value(), &DataValue::Numeric(102.0));
}

#[test]
fn set_source_rejects_a_cycle_and_leaves_the_chain_intact() {
    let hub = Hub::new();
    hub.io().create_input("/a", SampleType::Numeric, "").unwrap();
    hub.admin().create_observation("/b").unwrap();
    hub.admin().create_observation("/c").unwrap();

    hub.admin().set_source("/b", "/a").unwrap();
    hub.admin().set_source("/c", "/b").unwrap();
    assert_eq!(hub.admin().set_source("/a", "/c"), Err(HubError::Duplicate));

    hub.io().push_numeric("/a", 5.0, 9.0).unwrap();
    assert_eq!(hub.query().get_current("/c").unwrap().value(), &DataValue::Numeric(9.0));
}

#[test]
fn json_extraction_pulls_a_nested_field_into_the_observation() {
    let hub = Hub::new();
    hub.io().create_input("/raw/event", SampleType::Json, "").unwrap();
    hub.admin().create_observation("/obs/event_code").unwrap();
    hub.admin()
        .configure_observation(
            "/obs/event_code",
            ObservationConfig { extraction: Some("payload.code".to_string()), buffer_max: Some(4), ..Default::default() },
        )
        .unwrap();
    hub.admin().set_source("/obs/event_code", "/raw/event").unwrap();

    hub.io().push_json("/raw/event", 1.0, r#"{"payload":{"code":42}}"#).unwrap();

    assert_eq!(hub.query().get_current("/obs/event_code").unwrap().value(), &DataValue::Numeric(42.0));
}

#[test]
fn snapshot_reports_deletions_and_then_stops_reporting_them_after_flush() {
    let hub = Hub::new();
    hub.query().set_deletion_tracking(true);
    hub.admin().create_observation("/temp/scratch").unwrap();
    hub.admin().delete_observation("/temp/scratch").unwrap();

    let mut out = Vec::new();
    hub.query()
        .snapshot("/", BEGINNING_OF_TIME, SnapshotFlags { flush_deletions_after: true }, Format::Json, &mut out)
        .unwrap();
    let first = String::from_utf8(out).unwrap();
    assert!(first.contains("\"deleted\":true"));

    // a cutoff far past "now" excludes everything untouched since the
    // first scan, exercising the delta path rather than a full dump.
    let mut out2 = Vec::new();
    hub.query().snapshot("/", 1.0e15, SnapshotFlags::default(), Format::Json, &mut out2).unwrap();
    let second = String::from_utf8(out2).unwrap();
    assert_eq!(second, "{}");
}

#[test]
fn config_document_creates_and_routes_an_observation() {
    let hub = Hub::new();
    hub.io().create_input("/sensors/temp", SampleType::Numeric, "c").unwrap();
    hub.io().create_output("/avg/temp", SampleType::Numeric, "c", false).unwrap();

    hub.config()
        .load_str(r#"{"o": {"/stats/temp": {"r": "/sensors/temp", "d": "/avg/temp", "f": "mean", "st": 5}}}"#)
        .unwrap();

    hub.io().push_numeric("/sensors/temp", 1.0, 10.0).unwrap();
    hub.io().push_numeric("/sensors/temp", 2.0, 20.0).unwrap();

    assert_eq!(hub.query().get_current("/avg/temp").unwrap().value(), &DataValue::Numeric(15.0));
}

#[test]
fn update_barrier_collapses_intermediate_pushes_to_the_latest() {
    let hub = Hub::new();
    hub.io().create_input("/x", SampleType::Numeric, "").unwrap();

    let starts = Rc::new(RefCell::new(0));
    let s = starts.clone();
    hub.io().add_update_handler(Rc::new(move |starting: bool| {
        if starting {
            *s.borrow_mut() += 1;
        }
    }));

    hub.admin().start_update();
    hub.io().push_numeric("/x", 1.0, 1.0).unwrap();
    hub.io().push_numeric("/x", 2.0, 2.0).unwrap();
    hub.io().push_numeric("/x", 3.0, 3.0).unwrap();
    assert_eq!(hub.query().get_current("/x"), Err(HubError::Unavailable));
    hub.admin().end_update();

    assert_eq!(hub.query().get_current("/x").unwrap().value(), &DataValue::Numeric(3.0));
    assert_eq!(*starts.borrow(), 1);
}

#[test]
fn deleting_an_input_with_a_default_downgrades_to_a_placeholder() {
    let hub = Hub::new();
    hub.io().create_input("/cfg/limit", SampleType::Numeric, "").unwrap();
    hub.admin().set_default("/cfg/limit", hub_types::DataSample::numeric(0.0, 10.0)).unwrap();

    hub.io().delete_resource("/cfg/limit").unwrap();
    assert_eq!(hub.query().get_current("/cfg/limit").unwrap().value(), &DataValue::Numeric(10.0));

    hub.io().create_input("/cfg/limit", SampleType::Numeric, "").unwrap();
    assert_eq!(hub.query().get_current("/cfg/limit").unwrap().value(), &DataValue::Numeric(10.0));
}

#[test]
fn set_namespace_is_rejected_on_a_hosted_deployment() {
    let hub = Hub::new();
    assert_eq!(hub.io().set_namespace("/app/a"), Err(HubError::NotPermitted));
}

#[test]
fn set_namespace_rebases_relative_io_paths_on_a_non_hosted_deployment() {
    let hub = crate::Hub::new_non_hosted();
    hub.io().set_namespace("/app/a").unwrap();
    hub.io().create_input("temp", SampleType::Numeric, "c").unwrap();

    hub.io().push_numeric("temp", 1.0, 21.5).unwrap();
    assert_eq!(hub.query().get_current("/app/a/temp").unwrap().value(), &DataValue::Numeric(21.5));

    // an absolute path still bypasses the namespace entirely.
    hub.io().create_input("/other/spot", SampleType::Numeric, "c").unwrap();
    hub.io().push_numeric("/other/spot", 1.0, 3.0).unwrap();
    assert_eq!(hub.query().get_current("/other/spot").unwrap().value(), &DataValue::Numeric(3.0));
}

#[test]
fn stat_computes_mean_over_the_buffer_window() {
    let hub = Hub::new();
    hub.admin().create_observation("/obs/x").unwrap();
    hub.admin().configure_observation("/obs/x", ObservationConfig { buffer_max: Some(10), ..Default::default() }).unwrap();

    for i in 0..5 {
        hub.io().push_numeric("/obs/x", 0.0, i as f64).unwrap();
    }

    // start_time below the 30-year threshold is relative-from-now; a
    // minute comfortably covers samples pushed moments ago in the test.
    let mean = hub.query().stat("/obs/x", Stat::Mean, 60.0).unwrap();
    assert_eq!(mean, 2.0);
}
