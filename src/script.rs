//! Scripts injected into pages, and the bootstrap that connects a page to the native side.

use std::fmt;

/// When an injected script runs.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LoadTime {
    /// Before any script of the document runs.
    #[default]
    Creation,
    /// Once the DOM has been parsed.
    Ready,
}

/// Which frames an injected script runs in.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Frame {
    #[default]
    Top,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub code: String,
    pub time: LoadTime,
    pub frame: Frame,
    /// Survives [`Webview::clear_scripts`](crate::webview::Webview::clear_scripts).
    pub permanent: bool,
}

impl Script {
    pub fn new(code: impl Into<String>, time: LoadTime) -> Self {
        Self {
            code: code.into(),
            time,
            frame: Frame::default(),
            permanent: false,
        }
    }

    pub fn frame(mut self, frame: Frame) -> Self {
        self.frame = frame;
        self
    }

    pub fn permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    /// Source handed to the backend, scoped to the requested frames.
    pub(crate) fn source(&self) -> String {
        match self.frame {
            Frame::All => self.code.clone(),
            Frame::Top => format!("if (self === top) {{\n{}\n}}", self.code),
        }
    }
}

/// Handle of an injected script, unique per webview.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub(crate) u64);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script#{}", self.0)
    }
}

const POST_MESSAGE: &str = "{post_message}";

const BOOTSTRAP: &str = r#"
window.saucer = window.saucer || {};

window.saucer.internal = {
    idc: 0,
    rpc: new Map(),
    message: async (message) => {
        {post_message}
    },
    send: async (message) => {
        const internal = window.saucer.internal;
        const id = ++internal.idc;

        const promise = new Promise((resolve, reject) => {
            internal.rpc.set(id, { resolve, reject });
        });

        await internal.message(JSON.stringify({ ...message, id }));
        return promise;
    },
    receive: (message) => {
        const internal = window.saucer.internal;
        const pending = internal.rpc.get(message.id);

        if (!pending) {
            return;
        }

        internal.rpc.delete(message.id);

        if ("error" in message) {
            pending.reject(message.error);
        } else {
            pending.resolve(message.result);
        }
    },
    resolve: async (id, value) => {
        const internal = window.saucer.internal;

        try {
            const result = await value;
            await internal.message(JSON.stringify({
                ["saucer:resolve"]: true,
                id,
                result: result === undefined ? null : result,
            }));
        } catch (error) {
            await internal.message(JSON.stringify({
                ["saucer:resolve"]: true,
                id,
                error: error instanceof Error ? error.message : (error ?? null),
            }));
        }
    },
};

window.saucer.call = async (name, params) => {
    if (!Array.isArray(params)) {
        throw "Bad arguments, expected array";
    }

    if (typeof name !== "string" && !(name instanceof String)) {
        throw "Bad name, expected string";
    }

    return window.saucer.internal.send({
        ["saucer:call"]: true,
        name,
        params,
    });
};

window.saucer.exposed = new Proxy({}, {
    get: (_, prop) => (...args) => window.saucer.call(prop, args),
});
"#;

/// Page-side runtime. `post_message` is the backend's statement that hands the string `message`
/// to the native side.
pub fn bootstrap(post_message: &str) -> String {
    BOOTSTRAP.replace(POST_MESSAGE, post_message)
}
