use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

/// Endpoint nothing listens on, so every fetch fails fast
const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:9";

/// Run the binary with an isolated config dir and hub home
fn run_hf_fetch(args: &[&str], scratch: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hf-fetch"))
        .args(args)
        .current_dir(scratch)
        .env("XDG_CONFIG_HOME", scratch.join("config"))
        .env("HF_HOME", scratch.join("hf_home"))
        .env_remove("HF_TOKEN")
        .env_remove("HF_ENDPOINT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run hf-fetch")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_missing_model_prints_usage() {
    let scratch = tempfile::tempdir().unwrap();
    let output = run_hf_fetch(&[], scratch.path());

    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("please specify a model name"));
    assert!(stdout.contains("Usage: hf-fetch"));
    assert!(stdout.contains("Qwen/Qwen2.5-0.5B-Instruct"));
}

#[test]
fn test_missing_model_ignores_other_flags() {
    let scratch = tempfile::tempdir().unwrap();
    let output = run_hf_fetch(
        &["--download-dir", "models", "--no-progress", "--revision", "v1"],
        scratch.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).contains("Usage: hf-fetch"));
    assert!(!scratch.path().join("models").exists());
}

#[test]
fn test_failed_download_exits_with_error_once() {
    let scratch = tempfile::tempdir().unwrap();
    let output = run_hf_fetch(
        &[
            "Qwen/Qwen2.5-0.5B-Instruct",
            "--download-dir",
            "cache",
            "--endpoint",
            UNREACHABLE_ENDPOINT,
            "--no-progress",
        ],
        scratch.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert_eq!(stdout.matches("❌ Error:").count(), 1, "stdout was:\n{stdout}");
    assert!(stdout.contains("config.json"));
    assert!(stdout.contains("Please check:"));
    assert!(!stdout.contains("Next steps"));
    assert!(scratch.path().join("cache").is_dir());
}

#[test]
fn test_default_download_dir_is_created_idempotently() {
    let scratch = tempfile::tempdir().unwrap();
    let args = [
        "microsoft/DialoGPT-medium",
        "--endpoint",
        UNREACHABLE_ENDPOINT,
        "--no-progress",
    ];

    for _ in 0..2 {
        let output = run_hf_fetch(&args, scratch.path());
        assert_eq!(output.status.code(), Some(1));
        let stdout = stdout_of(&output);
        assert!(stdout.contains("Destination: ./hf_models"));
        assert!(scratch.path().join("hf_models").is_dir());
    }
}

#[test]
fn test_invalid_config_file_fails() {
    let scratch = tempfile::tempdir().unwrap();
    let config_dir = scratch.path().join("config").join("hf-fetch");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "[hub\nrevision = 1").unwrap();

    let output = run_hf_fetch(&["gpt2", "--download-dir", "cache"], scratch.path());

    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert_eq!(stdout.matches("❌ Error:").count(), 1);
    assert!(stdout.contains("Config error"));
    assert!(stdout.contains("config.toml"));
    assert!(!stdout.contains("Please check:"));
}

const MOCK_COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

const WORD_LEVEL_TOKENIZER: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {"[UNK]": 0, "hello": 1, "world": 2},
        "unk_token": "[UNK]"
    }
}"#;

/// Files served by the local hub, keyed by name
struct MockRepo {
    model_id: String,
    files: Vec<(String, Vec<u8>)>,
}

/// Serve `repo` over HTTP on a loopback port and return the endpoint URL
fn spawn_mock_hub(repo: MockRepo) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind mock hub");
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let repo = Arc::new(repo);

    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let repo = Arc::clone(&repo);
            std::thread::spawn(move || handle_request(stream, &repo));
        }
    });

    endpoint
}

fn handle_request(mut stream: TcpStream, repo: &MockRepo) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut range = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                range = Some(value.trim().to_string());
            }
        }
    }

    let info_path = format!("/api/models/{}/revision/main", repo.model_id);
    let resolve_prefix = format!("/{}/resolve/main/", repo.model_id);

    let (status, headers, body) = if path == info_path {
        let siblings: Vec<_> = repo
            .files
            .iter()
            .map(|(name, _)| serde_json::json!({ "rfilename": name }))
            .chain(std::iter::once(serde_json::json!({ "rfilename": "README.md" })))
            .collect();
        let body = serde_json::json!({ "sha": MOCK_COMMIT, "siblings": siblings }).to_string();
        (
            "200 OK",
            vec!["Content-Type: application/json".to_string()],
            body.into_bytes(),
        )
    } else if let Some(index) = path
        .strip_prefix(&resolve_prefix)
        .and_then(|name| repo.files.iter().position(|(n, _)| n == name))
    {
        let data = &repo.files[index].1;
        let (start, end) = parse_range(range.as_deref(), data.len());
        (
            "206 Partial Content",
            vec![
                format!("ETag: \"mock-etag-{index}\""),
                format!("X-Repo-Commit: {MOCK_COMMIT}"),
                format!("Content-Range: bytes {start}-{end}/{}", data.len()),
            ],
            data[start..=end].to_vec(),
        )
    } else {
        ("404 Not Found", Vec::new(), b"not found".to_vec())
    };

    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for header in headers {
        response.push_str(&header);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");

    let _ = stream.write_all(response.as_bytes());
    if method != "HEAD" {
        let _ = stream.write_all(&body);
    }
    let _ = stream.flush();
}

/// Inclusive byte range from a `bytes=a-b` / `bytes=a-` header
fn parse_range(range: Option<&str>, len: usize) -> (usize, usize) {
    let last = len - 1;
    let Some(spec) = range.and_then(|r| r.strip_prefix("bytes=")) else {
        return (0, last);
    };
    let (start, end) = spec.split_once('-').unwrap_or((spec, ""));
    let start = start.parse::<usize>().unwrap_or(0).min(last);
    let end = end.parse::<usize>().unwrap_or(last).min(last);
    (start, end)
}

/// Files under `dir`, counting symlinks that resolve to files and not entering linked dirs
fn count_cached_files(dir: &Path) -> u64 {
    let mut count = 0;
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if entry.file_type().unwrap().is_dir() {
            count += count_cached_files(&path);
        } else if fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            count += 1;
        }
    }
    count
}

fn tiny_safetensors(scratch: &Path) -> Vec<u8> {
    let path = scratch.join("weights.safetensors");
    let mut tensors = HashMap::new();
    tensors.insert(
        "embed.weight".to_string(),
        Tensor::zeros((3, 4), DType::F32, &Device::Cpu).unwrap(),
    );
    candle_core::safetensors::save(&tensors, &path).unwrap();
    let bytes = fs::read(&path).unwrap();
    fs::remove_file(&path).unwrap();
    bytes
}

#[test]
fn test_successful_download_reports_statistics() {
    let scratch = tempfile::tempdir().unwrap();
    let config = r#"{"model_type": "llama", "architectures": ["LlamaForCausalLM"], "torch_dtype": "float32"}"#;

    let endpoint = spawn_mock_hub(MockRepo {
        model_id: "org/tiny".to_string(),
        files: vec![
            ("config.json".to_string(), config.as_bytes().to_vec()),
            ("tokenizer.json".to_string(), WORD_LEVEL_TOKENIZER.as_bytes().to_vec()),
            ("model.safetensors".to_string(), tiny_safetensors(scratch.path())),
        ],
    });

    let output = run_hf_fetch(
        &[
            "org/tiny",
            "--download-dir",
            "out",
            "--endpoint",
            &endpoint,
            "--no-progress",
        ],
        scratch.path(),
    );

    let stdout = stdout_of(&output);
    assert_eq!(output.status.code(), Some(0), "stdout was:\n{stdout}");
    assert!(stdout.contains("✅ Config ready: llama"));
    assert!(stdout.contains("✅ Tokenizer ready (vocab: 3)"));
    assert!(stdout.contains("Architecture: LlamaForCausalLM"));
    assert!(stdout.contains("Tensors: 1 (12 parameters)"));
    assert!(stdout.contains("Next steps"));
    assert!(stdout.contains("./run_vllm_quantized.sh org/tiny none"));
    assert!(!stdout.contains("❌"));

    let cache_folder = scratch.path().join("out").join("models--org--tiny");
    assert!(cache_folder.is_dir());

    let reported: u64 = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("- Files: "))
        .expect("No file count in output")
        .parse()
        .unwrap();
    assert!(reported >= 3);
    assert_eq!(reported, count_cached_files(&cache_folder));
}
