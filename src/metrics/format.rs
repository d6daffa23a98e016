//! Prometheus 文本暴露格式（0.0.4）渲染。

use std::fmt::Write;

use super::{Desc, Sample};

pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// 按描述符顺序输出：每个至少有一条样本的描述符输出一次 HELP/TYPE，随后是它的全部样本。
///
/// 同一指标族的样本必须连续出现，因此这里按描述符分组，而不是按采集顺序直接输出。
pub fn render_text(descs: &[&'static Desc], samples: &[Sample]) -> String {
    let mut output = String::new();

    for desc in descs {
        let mut family = samples.iter().filter(|s| std::ptr::eq(s.desc, *desc)).peekable();
        if family.peek().is_none() {
            continue;
        }

        let _ = writeln!(output, "# HELP {} {}", desc.name, escape_help(desc.help));
        let _ = writeln!(output, "# TYPE {} {}", desc.name, desc.metric_type.as_str());

        for sample in family {
            if desc.label_names.is_empty() {
                let _ = writeln!(output, "{} {}", desc.name, format_value(sample.value));
                continue;
            }
            let labels: Vec<String> = desc
                .label_names
                .iter()
                .zip(sample.label_values.iter())
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                .collect();
            let _ = writeln!(
                output,
                "{}{{{}}} {}",
                desc.name,
                labels.join(","),
                format_value(sample.value)
            );
        }
    }

    output
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() { "+Inf" } else { "-Inf" }.to_string()
    } else if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{}", v)
    }
}
