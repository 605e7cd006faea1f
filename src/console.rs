//! User-facing text printed by the `hf-fetch` binary.

use std::path::Path;

/// Default destination when `--download-dir` is not given
pub const DEFAULT_DOWNLOAD_DIR: &str = "./hf_models";

/// Usage guidance printed when no model name is given
#[must_use]
pub fn usage_text() -> String {
    [
        "Usage: hf-fetch <MODEL_NAME> [--download-dir DIR]",
        "",
        "Examples:",
        "🔤 Text-only models (lightweight):",
        "  hf-fetch Qwen/Qwen2.5-0.5B-Instruct",
        "  hf-fetch Qwen/Qwen2.5-1.5B-Instruct",
        "  hf-fetch Qwen/Qwen2.5-3B-Instruct",
        "",
        "🖼️ Multimodal models:",
        "  hf-fetch Qwen/Qwen2.5-VL-3B-Instruct-AWQ",
        "  hf-fetch Qwen/Qwen2-VL-2B-Instruct",
        "",
        "📝 Other:",
        "  hf-fetch microsoft/DialoGPT-medium",
        "",
        "Note: the model name must be a valid Hugging Face repository ID",
    ]
    .join("\n")
}

/// Banner printed before the download starts
#[must_use]
pub fn banner_text(model_name: &str, download_dir: &Path) -> String {
    format!(
        "🚀 Starting model download\nModel: {model_name}\nDestination: {}\n",
        download_dir.display()
    )
}

/// Follow-up commands printed after a successful download
#[must_use]
pub fn next_steps_text(model_name: &str) -> String {
    format!(
        "\n✅ Download completed successfully!\n\
         \n\
         📋 Next steps:\n\
         1. Start the vLLM server:\n   \
            ./run_vllm_quantized.sh {model_name} none\n\
         \n\
         2. To use quantization:\n   \
            ./run_vllm_quantized.sh {model_name} bitsandbytes\n\
         \n\
         3. Or download another model:\n   \
            hf-fetch <another-model-name>"
    )
}

/// Checklist printed after a failed download
#[must_use]
pub fn troubleshooting_text() -> String {
    [
        "",
        "❌ An error occurred during download",
        "Please check:",
        "1. The model name is correct",
        "2. Your internet connection is stable",
        "3. There is enough free disk space",
    ]
    .join("\n")
}
