use std::time::Duration;
use thread_js_set_interval::{set_interval_async, set_timeout_async, TimerError};

async fn tick() {
    println!("hello from async interval");
}

#[tokio::main]
async fn main() -> Result<(), TimerError> {
    tracing_subscriber::fmt::init();

    let interval = set_interval_async!(tick, 10)?;
    let timeout = set_timeout_async!(
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            "hello from async timeout"
        },
        25
    )?;

    println!("{}", timeout.join().await?);
    interval.cancel();
    let count = interval.join().await?;
    println!("interval fired {count} times");
    Ok(())
}
