//! CQ code parsing.
//!
//! OneBot delivers messages as strings with inline codes such as
//! `[CQ:image,file=a.jpg,url=https://...]` or `[CQ:at,qq=10001]`. Reserved
//! characters inside the string arrive entity-escaped (`&#91;` for `[`).

use std::sync::LazyLock;

use regex::Regex;

use cqrelay_core::types::ParsedMessage;

static CQ_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[CQ:[^\]]+\]").unwrap());

static CQ_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CQ:image,[^\]]*url=([^,\]]+)\]").unwrap());

static CQ_AT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[CQ:at,qq=(\d+)\]").unwrap());

static CQ_REPLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CQ:reply,id=(-?\d+)\]").unwrap());

/// Parse a raw OneBot message string. Never fails: anything that does not
/// match a CQ code is kept as text.
pub fn parse(raw: &str) -> ParsedMessage {
    let decoded = html_escape::decode_html_entities(raw);

    let image_urls = CQ_IMAGE
        .captures_iter(&decoded)
        .map(|c| c[1].to_string())
        .collect();

    let mentioned_users = CQ_AT
        .captures_iter(&decoded)
        .map(|c| c[1].to_string())
        .collect();

    let reply_to = CQ_REPLY.captures(&decoded).map(|c| c[1].to_string());

    let text = CQ_CODE.replace_all(&decoded, "").trim().to_string();

    ParsedMessage {
        text,
        image_urls,
        mentioned_users,
        reply_to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_trimmed() {
        let msg = parse("  hello  ");
        assert_eq!(msg, ParsedMessage::text("hello"));
    }

    #[test]
    fn image_urls_keep_document_order() {
        let msg = parse(
            "look [CQ:image,file=1.jpg,url=https://a/1.jpg] and \
             [CQ:at,qq=42][CQ:image,file=2.jpg,url=https://a/2.jpg]",
        );
        assert_eq!(msg.image_urls, ["https://a/1.jpg", "https://a/2.jpg"]);
        assert_eq!(msg.mentioned_users, ["42"]);
        assert_eq!(msg.text, "look  and");
    }

    #[test]
    fn escaped_codes_are_decoded_before_matching() {
        let raw = "&#91;CQ:image,file=x.png,url=https://img.example/x.png?a=1&amp;b=2&#93;";
        let msg = parse(&format!("{raw}describe"));
        assert_eq!(msg.image_urls, ["https://img.example/x.png?a=1&b=2"]);
        assert_eq!(msg.text, "describe");
    }

    #[test]
    fn image_without_url_is_stripped_but_not_extracted() {
        let msg = parse("[CQ:image,file=abc.image]hi");
        assert!(msg.image_urls.is_empty());
        assert_eq!(msg.text, "hi");
    }

    #[test]
    fn url_must_close_the_code() {
        let msg = parse("[CQ:image,url=https://a/1.jpg,subType=0]");
        assert!(msg.image_urls.is_empty());
        assert_eq!(msg.text, "");
    }

    #[test]
    fn only_first_reply_is_kept() {
        let msg = parse("[CQ:reply,id=-123][CQ:reply,id=456]ok");
        assert_eq!(msg.reply_to.as_deref(), Some("-123"));
        assert_eq!(msg.text, "ok");
    }

    #[test]
    fn mentions_collect_in_order() {
        let msg = parse("[CQ:at,qq=1] [CQ:at,qq=22] hey [CQ:at,qq=333]");
        assert_eq!(msg.mentioned_users, ["1", "22", "333"]);
        assert_eq!(msg.text, "hey");
    }

    #[test]
    fn unknown_codes_are_stripped_without_fields() {
        let msg = parse("[CQ:face,id=178]哈哈[CQ:record,file=a.amr]");
        assert_eq!(msg, ParsedMessage::text("哈哈"));
    }

    #[test]
    fn malformed_codes_stay_in_text() {
        let msg = parse("[CQ:at,qq=12 unterminated");
        assert_eq!(msg.text, "[CQ:at,qq=12 unterminated");
        assert!(msg.mentioned_users.is_empty());

        let msg = parse("[CQ:at,qq=abc]");
        assert!(msg.mentioned_users.is_empty());
        assert_eq!(msg.text, "");
    }

    #[test]
    fn only_codes_yield_empty_text() {
        let msg = parse("[CQ:image,file=a,url=https://a/a.gif]");
        assert_eq!(msg.text, "");
        assert!(msg.has_images());
    }
}
