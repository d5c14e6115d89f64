//! 翻訳テンプレートへのパラメータ埋め込み

use serde_json::{
    Map,
    Value,
};

/// 名前付きの埋め込みパラメータ
pub type InterpolationParams = Map<String, Value>;

/// テンプレートにパラメータを埋め込む
pub trait Interpolator: Send + Sync {
    /// `template` の表示用文字列を生成
    fn interpolate(&self, template: &str, params: &InterpolationParams) -> String;
}

/// `{{ name }}` プレースホルダーの埋め込み
///
/// ネストしたパラメータはドット区切りで参照できます（`{{ user.name }}`）。
/// 文字列はそのまま、数値と真偽値は JSON 表記で埋め込みます。
/// 表示できる値に解決できないプレースホルダーはそのまま残します。
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateInterpolator;

/// プレースホルダーの開始
const OPEN: &str = "{{";
/// プレースホルダーの終了
const CLOSE: &str = "}}";

impl TemplateInterpolator {
    /// ドット区切りのパスでパラメータを参照
    fn lookup<'a>(params: &'a InterpolationParams, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut current = params.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// スカラー値を文字列にする
    fn render(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl Interpolator for TemplateInterpolator {
    fn interpolate(&self, template: &str, params: &InterpolationParams) -> String {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;

        while let Some((before, after_open)) = rest.split_once(OPEN) {
            output.push_str(before);

            let Some((name, after_close)) = after_open.split_once(CLOSE) else {
                output.push_str(OPEN);
                output.push_str(after_open);
                return output;
            };

            match Self::lookup(params, name.trim()).and_then(Self::render) {
                Some(value) => output.push_str(&value),
                None => {
                    output.push_str(OPEN);
                    output.push_str(name);
                    output.push_str(CLOSE);
                }
            }
            rest = after_close;
        }

        output.push_str(rest);
        output
    }
}
