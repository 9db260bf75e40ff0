#[cfg(test)]
pub const POST_WITHOUT_METADATA: &str = "# What I learned after 20+ years of software development
How to be a great software engineer?

Someone asked me this question today and I didn’t have an answer. After thinking for a while, I came up with a list of what I try to do myself.

## Non technical

### Have a honest image of yourself

You finished university and learned a lot. You solved many hard problems.
Some day in your life, you will find that you are not and that there are many developers much better than you. **The earlier you find that, the better.** This will drive you to improve yourself as you now recognize better your weakest points.
";

#[cfg(test)]
pub const POST_METADATA_LINE: &str = r#"{"description":"Lessons from a career","title":"What I learned","datepublished":"2022-04-02","tags":["career","engineering"],"filename":"learned"}"#;

#[cfg(test)]
pub fn post_with_metadata() -> String {
    format!("{}\n{}", POST_METADATA_LINE, POST_WITHOUT_METADATA)
}
