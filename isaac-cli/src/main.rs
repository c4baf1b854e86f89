//! Demo driver: builds `y <- 2*x + 3*y` over two length-1024 vectors, runs
//! it through the dispatcher against the host-memory `sim` backend, and
//! prints the resulting kernel source and bound arguments.

use isaac_core::driver::{Context, SimBackend};
use isaac_core::expression::{Node, Token, TokenFamily, TokenType, Tree};
use isaac_core::{dispatch::Dispatcher, execute, Environment, Launcher, Optimize};
use isaac_types::{NumericType, Scalar, ScalarValue, Shape, Stride};

fn vector(context: &std::sync::Arc<dyn Context>, len: i64) -> Tree {
    let buffer = context.allocate(len as usize * NumericType::Float32.size_of()).expect("allocate");
    let node = Node::DenseArray {
        dtype: NumericType::Float32,
        shape: Shape::new(vec![len]),
        stride: Stride::new(vec![1]),
        start_offset: 0,
        buffer,
    };
    Tree::leaf(node, context.clone())
}

fn scalar(context: &std::sync::Arc<dyn Context>, value: f32) -> Tree {
    Tree::leaf(
        Node::ValueScalar { dtype: NumericType::Float32, value: Scalar::new(ScalarValue::Float32(value)) },
        context.clone(),
    )
}

fn main() {
    tracing_subscriber::fmt::init();

    let (context, queue) = SimBackend::new_queue(isaac_core::driver::Backend::OpenClLike);
    let context: std::sync::Arc<dyn Context> = context;

    let x = vector(&context, 1024);
    let y = vector(&context, 1024);
    let two = scalar(&context, 2.0);
    let three = scalar(&context, 3.0);

    let two_x = Tree::compose(&two, Token::mult(), &x, NumericType::Float32, x.shape()).expect("2*x");
    let three_y = Tree::compose(&three, Token::mult(), &y, NumericType::Float32, y.shape()).expect("3*y");
    let sum = Tree::compose(&two_x, Token::new(TokenFamily::BinaryArithmetic, TokenType::Add), &three_y, NumericType::Float32, x.shape())
        .expect("2*x + 3*y");
    let assign = Tree::compose(&y, Token::assign(), &sum, NumericType::Float32, y.shape()).expect("y <- 2*x + 3*y");

    let dispatcher = Dispatcher::with_default_profiles();
    let launcher = Launcher { tree: assign, environment: Environment::new(queue.as_ref()), optimize: Optimize::default() };

    match execute(launcher, &dispatcher) {
        Ok(events) => println!("dispatched {} kernel launch(es)", events.len()),
        Err(err) => eprintln!("execution failed: {err}"),
    }
}
