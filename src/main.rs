use cellar::{Cell, Environment, cell, evaluate};

/// Enable with `RUST_LOG=cellar=debug` or `RUST_LOG=cellar=trace`.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn demo_program() -> Vec<Cell> {
    vec![
        cell!((define square (lambda (x) (* x x)))),
        cell!((print (square 12))),
        cell!((define fact (lambda (n) (if (< n 1) 1 (* n (fact (- n 1))))))),
        cell!((fact 10)),
        cell!((let ((a 3) (b 4)) (+ (square a) (square b)))),
        cell!((apply + (quote (1 2 3 4.5)))),
        cell!((cons 1 (cons 2 ()))),
        cell!((eval (cons (quote /) (quote (1 8))))),
        cell!((car (quote ()))),
        cell!((define square 0)),
        cell!((print (quote done))),
    ]
}

fn main() {
    init_tracing();

    let mut env = Environment::new();
    for expr in demo_program() {
        println!("> {}", expr);
        match evaluate(&expr, &mut env) {
            Ok(Cell::Nil) => {}
            Ok(value) => println!("{}", value),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}
