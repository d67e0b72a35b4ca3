use thread_js_set_interval::{set_timeout, TimerError};

fn main() -> Result<(), TimerError> {
    let timeouts = vec![
        // macro takes expression
        set_timeout!(println!("hello1"), 4)?,
        // macro takes block
        set_timeout!({ println!("hello2") }, 3)?,
        // macro takes direct closure expressions
        set_timeout!(|| println!("hello3"), 2)?,
        // macro takes direct move closure expressions
        set_timeout!(move || println!("hello4"), 2)?,
    ];
    // macro takes identifiers (which must point to closures)
    let closure = || println!("hello5");
    let last = set_timeout!(closure, 1)?;

    for timeout in timeouts {
        timeout.join()?;
    }
    last.join()?;

    // closures may return a value
    let sum = set_timeout!(|| (1..=10).sum::<u32>(), 5)?;
    println!("sum = {}", sum.join()?);
    Ok(())
}
