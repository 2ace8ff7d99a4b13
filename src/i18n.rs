// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持印尼语（默认）和英文；通知标题/正文均走此模块
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 默认语言（印尼语）
pub const DEFAULT_LOCALE: &str = "id";

/// 切换到默认语言；程序入口调用一次
pub fn init() {
    set_locale(DEFAULT_LOCALE);
}

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"id" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use umkm_automation::i18n::t;
/// let msg = t("common.up");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数，占位符写作 %{name}）
///
/// # 示例
/// ```no_run
/// use umkm_automation::i18n::t_with_args;
/// let msg = t_with_args("notification.batch_completed.message", &[("recipe", "Roti"), ("qty", "20")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // rust-i18n 的 locale 为全局状态，且 Rust 测试默认并行执行；
    // 为避免测试互相干扰，这里对 i18n 相关测试串行化。
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        init();
        assert_eq!(current_locale(), DEFAULT_LOCALE);
    }

    #[test]
    fn test_set_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("id");
        assert_eq!(current_locale(), "id");

        set_locale("en");
        assert_eq!(current_locale(), "en");

        init();
    }

    #[test]
    fn test_translate_simple() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("id");
        assert_eq!(t("notification.batch_completed.title"), "Produksi Selesai");

        set_locale("en");
        assert_eq!(t("notification.batch_completed.title"), "Production Completed");

        init();
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("id");
        let msg = t_with_args(
            "notification.batch_completed.message",
            &[("recipe", "Roti Manis"), ("qty", "20")],
        );
        assert_eq!(msg, "Roti Manis (20 unit) telah selesai diproduksi");

        set_locale("en");
        let msg = t_with_args(
            "notification.batch_completed.message",
            &[("recipe", "Roti Manis"), ("qty", "20")],
        );
        assert!(msg.contains("Roti Manis"));
        assert!(msg.contains("20"));

        init();
    }
}
