#![cfg(windows)]

use wmiq::{Session, Variant, WmiDateTime};

#[test]
fn it_reads_the_processor_name_as_text() {
    let session = Session::open("cimv2").unwrap();

    let result = session
        .exec_query("SELECT Name FROM Win32_Processor")
        .unwrap();

    assert!(!result.is_empty());

    let name: String = result
        .get_at(0)
        .unwrap()
        .property("Name")
        .expect("the processor should have a name");

    assert!(!name.is_empty());
}

#[test]
fn it_keeps_the_connection_alive_for_derived_objects() {
    let result = {
        let session = Session::open("cimv2").unwrap();

        session
            .exec_query("SELECT * FROM Win32_OperatingSystem")
            .unwrap()
        // The caller's session handle goes out of scope here.
    };

    assert_eq!(result.len(), 1);

    let caption: Option<String> = result.property("Caption");
    assert!(caption.is_some());

    let instance = result.get_at(0).unwrap().clone();
    drop(result);

    // The last surviving object still holds the connection open.
    let version: Option<String> = instance.property("Version");
    assert!(version.is_some());
}

#[test]
fn it_reads_typed_values_of_every_shape() {
    let session = Session::open("cimv2").unwrap();

    let result = session
        .exec_query("SELECT * FROM Win32_OperatingSystem")
        .unwrap();
    let os = result.get_at(0).unwrap();

    let primary: Option<bool> = os.property("Primary");
    assert!(primary.is_some());

    let serial: Option<String> = os.property("SerialNumber");
    assert!(serial.is_some());

    // FreePhysicalMemory is a uint64, which WMI transports as a string.
    let free: Option<u64> = os.property("FreePhysicalMemory");
    assert!(free.is_some());

    let boot_time: Option<WmiDateTime> = os.property("LastBootUpTime");
    assert!(boot_time.is_some());

    // MUILanguages is an array of strings, e.g. ["en-US"].
    match os.raw_property("MUILanguages").unwrap() {
        Variant::Array(_) | Variant::Null => {}
        other => panic!("expected an array of languages, got {:?}", other),
    }
}

#[test]
fn it_counts_and_indexes_disk_drives() {
    let session = Session::open("cimv2").unwrap();

    let result = session
        .exec_query("SELECT Model FROM Win32_DiskDrive")
        .unwrap();

    for index in 0..result.len() {
        let drive = result.get_at(index).unwrap();
        let model: Option<Variant> = drive.property("Model");

        assert!(model.is_some());
    }

    assert!(result.get_at(result.len()).is_err());
}
