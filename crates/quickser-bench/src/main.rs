//! Benchmark for quickser using a synthetic company graph.
//!
//! Employees share department objects and point at their managers, so the
//! graph exercises back-references. The same data is also written as JSON
//! with serde for a size and speed comparison.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use quickser::{ClassBuilder, ClassRegistry, ObjectRef, Serializable};
use serde::{Deserialize, Serialize};

const DEFAULT_EMPLOYEES: usize = 100_000;
const DEPARTMENTS: usize = 64;
const DECODE_ITERS: u32 = 10;
const DECODE_THREADS: usize = 4;

#[derive(Default)]
struct Department {
    name: String,
    budget: i64,
}

impl Serializable for Department {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("bench.Department")
            .blank_default()
            .field("name", |d| &d.name, |d| &mut d.name)
            .field("budget", |d| &d.budget, |d| &mut d.budget);
    }
}

#[derive(Default)]
struct Employee {
    name: String,
    age: i32,
    salary: f64,
    department: Option<ObjectRef>,
    manager: Option<ObjectRef>,
}

impl Serializable for Employee {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("bench.Employee")
            .blank_default()
            .field("name", |e| &e.name, |e| &mut e.name)
            .field("age", |e| &e.age, |e| &mut e.age)
            .field("salary", |e| &e.salary, |e| &mut e.salary)
            .field("department", |e| &e.department, |e| &mut e.department)
            .field("manager", |e| &e.manager, |e| &mut e.manager);
    }
}

#[derive(Default)]
struct Company {
    name: String,
    staff: Vec<ObjectRef>,
}

impl Serializable for Company {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("bench.Company")
            .blank_default()
            .field("name", |c| &c.name, |c| &mut c.name)
            .field("staff", |c| &c.staff, |c| &mut c.staff);
    }
}

/// JSON equivalent: shared objects become indices.
#[derive(Serialize, Deserialize)]
struct JsonCompany {
    name: String,
    departments: Vec<JsonDepartment>,
    staff: Vec<JsonEmployee>,
}

#[derive(Serialize, Deserialize)]
struct JsonDepartment {
    name: String,
    budget: i64,
}

#[derive(Serialize, Deserialize)]
struct JsonEmployee {
    name: String,
    age: i32,
    salary: f64,
    department: usize,
    manager: Option<usize>,
}

fn build_json(employees: usize) -> JsonCompany {
    JsonCompany {
        name: "Initech".to_string(),
        departments: (0..DEPARTMENTS)
            .map(|d| JsonDepartment {
                name: format!("department-{d}"),
                budget: 1_000_000 + d as i64 * 25_000,
            })
            .collect(),
        staff: (0..employees)
            .map(|i| JsonEmployee {
                name: format!("employee-{i}"),
                age: 20 + (i % 45) as i32,
                salary: 40_000.0 + (i % 1000) as f64 * 17.5,
                department: i % DEPARTMENTS,
                manager: (i >= DEPARTMENTS).then(|| i % DEPARTMENTS),
            })
            .collect(),
    }
}

fn build_graph(json: &JsonCompany) -> ObjectRef {
    let departments: Vec<ObjectRef> = json
        .departments
        .iter()
        .map(|d| {
            ObjectRef::new(Department {
                name: d.name.clone(),
                budget: d.budget,
            })
        })
        .collect();

    let mut staff: Vec<ObjectRef> = Vec::with_capacity(json.staff.len());
    for e in &json.staff {
        let employee = ObjectRef::new(Employee {
            name: e.name.clone(),
            age: e.age,
            salary: e.salary,
            department: Some(departments[e.department].clone()),
            manager: e.manager.map(|m| staff[m].clone()),
        });
        staff.push(employee);
    }

    ObjectRef::new(Company {
        name: json.name.clone(),
        staff,
    })
}

fn main() {
    let employees = std::env::args()
        .nth(1)
        .map(|n| n.parse().expect("employee count must be a number"))
        .unwrap_or(DEFAULT_EMPLOYEES);

    let registry = Arc::new(ClassRegistry::new());
    registry.bind::<Department>().expect("Failed to bind Department");
    registry.bind::<Employee>().expect("Failed to bind Employee");
    registry.bind::<Company>().expect("Failed to bind Company");

    let build_start = Instant::now();
    let json = build_json(employees);
    let company = build_graph(&json);
    println!(
        "Built {} employees in {} departments in {:?}",
        employees,
        DEPARTMENTS,
        build_start.elapsed()
    );

    // JSON baseline
    let json_start = Instant::now();
    let json_bytes = serde_json::to_vec(&json).expect("Failed to serialize JSON");
    let json_encode_time = json_start.elapsed();

    let json_start = Instant::now();
    let parsed: JsonCompany = serde_json::from_slice(&json_bytes).expect("Failed to parse JSON");
    let json_decode_time = json_start.elapsed();
    assert_eq!(parsed.staff.len(), employees);

    println!(
        "\nJSON: {} bytes, encode {:?}, decode {:?}",
        json_bytes.len(),
        json_encode_time,
        json_decode_time
    );

    // First encode registers classes; time the steady state separately
    let first_start = Instant::now();
    let encoded = quickser::encode(&registry, &company).expect("Failed to encode");
    let first_time = first_start.elapsed();

    let encode_start = Instant::now();
    let encoded_again = quickser::encode(&registry, &company).expect("Failed to encode");
    let encode_time = encode_start.elapsed();
    assert_eq!(encoded, encoded_again, "Encoding should be deterministic");

    println!(
        "\nUncompressed: {} bytes in {:?} (first call {:?})",
        encoded.len(),
        encode_time,
        first_time
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (encoded.len() as f64 / 1_000_000.0) / encode_time.as_secs_f64()
    );

    let compress_start = Instant::now();
    let compressed = quickser::encode_compressed(&registry, &company, 3).expect("Failed to compress");
    let compress_time = compress_start.elapsed();

    println!(
        "\nCompressed (level 3): {} bytes in {:?}",
        compressed.len(),
        compress_time
    );
    println!(
        "  Compression ratio: {:.1}x",
        encoded.len() as f64 / compressed.len() as f64
    );

    // Warmup
    for _ in 0..3 {
        let _ = quickser::decode(&registry, &encoded).expect("Failed to decode");
    }

    let decode_start = Instant::now();
    let mut decoded = None;
    for _ in 0..DECODE_ITERS {
        decoded = Some(quickser::decode(&registry, &encoded).expect("Failed to decode"));
    }
    let decode_time = decode_start.elapsed() / DECODE_ITERS;
    let decoded = decoded.expect("at least one decode iteration");

    println!(
        "\nDecode (uncompressed): {:?} (avg of {} iterations)",
        decode_time, DECODE_ITERS
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (encoded.len() as f64 / 1_000_000.0) / decode_time.as_secs_f64()
    );

    {
        let company = decoded.read::<Company>().expect("root is a Company");
        assert_eq!(company.staff.len(), employees);
        if employees > DEPARTMENTS {
            let first = company.staff[0].read::<Employee>().expect("staff are Employees");
            let late = company.staff[DEPARTMENTS].read::<Employee>().expect("staff are Employees");
            let shared = first.department.as_ref().zip(late.department.as_ref());
            assert!(shared.is_some_and(|(a, b)| a.ptr_eq(b)), "departments should be shared");
        }
    }

    let decode_compressed_start = Instant::now();
    for _ in 0..DECODE_ITERS {
        quickser::decode(&registry, &compressed).expect("Failed to decode compressed");
    }
    let decode_compressed_time = decode_compressed_start.elapsed() / DECODE_ITERS;
    println!(
        "\nDecode (compressed): {:?} (avg of {} iterations)",
        decode_compressed_time, DECODE_ITERS
    );

    // Concurrent decodes over one shared registry
    let encoded = Arc::new(encoded);
    let threaded_start = Instant::now();
    let handles: Vec<_> = (0..DECODE_THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let encoded = Arc::clone(&encoded);
            thread::spawn(move || {
                for _ in 0..DECODE_ITERS {
                    quickser::decode(&registry, &encoded).expect("Failed to decode");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("decode thread panicked");
    }
    let threaded_time = threaded_start.elapsed();
    println!(
        "\nDecode ({} threads x {} iterations): {:?}",
        DECODE_THREADS, DECODE_ITERS, threaded_time
    );

    println!("\n=== Summary ===");
    println!("Classes registered: {}", registry.len());
    println!(
        "quickser uncompressed: {} bytes ({:.1} MB)",
        encoded.len(),
        encoded.len() as f64 / 1_000_000.0
    );
    println!(
        "quickser compressed: {} bytes ({:.1} MB)",
        compressed.len(),
        compressed.len() as f64 / 1_000_000.0
    );
    println!(
        "Size vs JSON: {:.1}% (uncompressed), {:.1}% (compressed)",
        100.0 * encoded.len() as f64 / json_bytes.len() as f64,
        100.0 * compressed.len() as f64 / json_bytes.len() as f64
    );
    println!(
        "Decode speed vs JSON: {:.1}x",
        json_decode_time.as_secs_f64() / decode_time.as_secs_f64()
    );
}
