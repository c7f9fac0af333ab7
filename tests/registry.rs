use usbtmc_link::{register, Context, Error, RusbDriver};

// The registry is process-wide, so everything touching it lives in this one test.
#[test]
fn default_driver_is_set_once() {
    assert!(matches!(
        Context::from_registry(),
        Err(Error::NoDriverRegistered)
    ));

    register(RusbDriver::new()).unwrap();
    assert!(Context::from_registry().is_ok());

    assert!(matches!(
        register(RusbDriver::new()),
        Err(Error::DriverAlreadyRegistered)
    ));
}
