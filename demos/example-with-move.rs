use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thread_js_set_interval::{set_interval, TimerError};

fn main() -> Result<(), TimerError> {
    let counter = Arc::new(AtomicU64::new(0));

    let counter_t = counter.clone();
    let slow = set_interval!(
        move || {
            counter_t.fetch_add(1, Ordering::SeqCst);
        },
        10
    )?;

    let counter_t = counter.clone();
    let fast = set_interval!(
        move || {
            counter_t.fetch_add(3, Ordering::SeqCst);
            println!("val={}", counter_t.load(Ordering::SeqCst));
        },
        5
    )?;

    std::thread::sleep(Duration::from_millis(25));
    slow.cancel();
    fast.cancel();
    slow.join()?;
    fast.join()?;

    // both timers released their clone of the counter
    assert_eq!(Arc::strong_count(&counter), 1);
    println!("final val={}", counter.load(Ordering::SeqCst));
    Ok(())
}
