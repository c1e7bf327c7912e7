//! Quick benchmark for the binding engine hot paths

use agentflow::binding::{inject_variables, interpolate, substitute, Bindings, Variables};
use agentflow::{to_runtime, Step};
use serde_json::json;
use std::time::Instant;

fn main() {
    let mut variables = Variables::new();
    variables.insert("topic".to_string(), json!("Rust ownership"));
    variables.insert("previous_output".to_string(), json!("Some earlier answer"));
    variables.insert("doc".to_string(), json!({"title": "Borrowing", "tags": ["a", "b"]}));

    let templates = vec![
        "Simple text with no placeholders",
        "Write about {{topic}}",
        "Refine {{previous_output}} for {{topic}}",
        "Nested {{doc.title}} tagged {{doc.tags.1}} about {{topic}}",
    ];

    println!("Interpolation Performance Test");
    println!("==============================\n");

    for template in &templates {
        let _ = interpolate(template, &variables);
    }

    for template in &templates {
        let iterations = 100_000;
        let start = Instant::now();

        for _ in 0..iterations {
            let _ = interpolate(template, &variables);
        }

        let elapsed = start.elapsed();
        println!("Template: {:60}", format!("\"{}\"", template));
        println!("  Time for {} iterations: {:?}", iterations, elapsed);
        println!("  Per operation: {:?}\n", elapsed / iterations);
    }

    println!("@name Substitution");
    println!("==================\n");

    let mut bindings = Bindings::new();
    bindings.insert("topic".to_string(), "Rust ownership".to_string());
    bindings.insert("audience".to_string(), "beginners".to_string());

    let text = "Explain @topic to @audience, then quiz @audience on @topic";
    let iterations = 100_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = substitute(text, &bindings);
    }
    let elapsed = start.elapsed();
    println!("  {} substitutions: {:?}", iterations, elapsed);
    println!("  Per operation: {:?}\n", elapsed / iterations);

    println!("Tree Injection");
    println!("==============\n");

    let leaves: Vec<Step> = (0..50)
        .map(|i| Step::step(format!("agent{}", i), "Work on @topic for @audience"))
        .collect();
    let tree = to_runtime(&Step::sequence(vec![
        Step::parallel(leaves.clone()),
        Step::sequence(leaves),
    ]));

    let iterations = 1_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let mut node = tree.clone();
        inject_variables(&mut node, &bindings);
    }
    let elapsed = start.elapsed();
    println!(
        "  {} nodes x {} iterations: {:?}",
        tree.count_nodes(),
        iterations,
        elapsed
    );
    println!("  Per tree: {:?}", elapsed / iterations);
}
