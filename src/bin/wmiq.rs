#[cfg(windows)]
fn main() {
    use std::env::args;
    use wmiq::Session;

    let query = match args().nth(1) {
        None => {
            eprintln!("Expected an argument with a WQL query");
            return;
        }
        Some(query) => query,
    };

    let session = match Session::open("cimv2") {
        Err(e) => {
            eprintln!("Couldn't connect to WMI: {}", e);
            return;
        }
        Ok(session) => session,
    };

    let result = match session.exec_query(&query) {
        Err(e) => {
            eprintln!("Couldn't run query {:?}: {}", query, e);
            return;
        }
        Ok(result) => result,
    };

    for (i, instance) in result.iter().enumerate() {
        println!("Result {}", i);

        let names = instance.list_properties().unwrap_or_default();

        for name in names {
            if let Ok(value) = instance.raw_property(&name) {
                println!("  {}: {:?}", name, value);
            }
        }
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("wmiq requires Windows (WMI is a Windows service)");
}
