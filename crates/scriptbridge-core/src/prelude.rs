//! Script-side glue compiled into every engine instance.
//!
//! Business-logic bundles never see host natives directly. The glue below
//! builds the `context` map their entry functions receive: one wrapper
//! object per service, each method funneling into the single typed
//! `__host_call` native and delivering results through the caller's
//! callback. `__dispatch` is the host's sole entry into script.

/// Glue source, compiled and merged ahead of the bundle at fabrication.
pub const PRELUDE_SOURCE: &str = r#"
// Host replies arrive as one of three map shapes:
//   #{ ok: value }     success with a value (unit included)
//   #{ handle: n }     success returning a host object
//   #{ err: #{ message: "..." } }   business-logic failure
// Contract violations and fatal host failures do not return at all; the
// native unwinds the script.

fn __error(message) {
    #{ message: message }
}

fn __check_callback(cb) {
    if type_of(cb) != "Fn" {
        __host_violation("callback not specified or is not a function");
    }
}

// Routes a host reply into an error-first callback.
fn __deliver(r, cb) {
    if "err" in r {
        cb.call(r.err, ());
    } else {
        cb.call((), r.ok);
    }
}

// Wraps a collection handle in its script-facing object.
fn __collection(h) {
    #{
        get_all: |cb| {
            __check_callback(cb);
            __deliver(__host_call(h, "get_all", []), cb)
        },
        get: |id, cb| {
            __check_callback(cb);
            __deliver(__host_call(h, "get", [id]), cb)
        },
        exists: |id, cb| {
            __check_callback(cb);
            __deliver(__host_call(h, "exists", [id]), cb)
        },
        add: |id, object, force, cb| {
            __check_callback(cb);
            __deliver(__host_call(h, "add", [id, object, force]), cb)
        },
        update: |id, object, cb| {
            __check_callback(cb);
            __deliver(__host_call(h, "update", [id, object]), cb)
        },
        remove: |id, cb| {
            __check_callback(cb);
            __deliver(__host_call(h, "remove", [id]), cb)
        },
    }
}

fn __data_service() {
    #{
        create_collection: |id, force, cb| {
            __check_callback(cb);
            let r = __host_call("data", "create_collection", [id, force]);
            if "err" in r {
                cb.call(r.err, ());
            } else {
                cb.call((), __collection(r.handle));
            }
        },
        get_collection: |id, cb| {
            __check_callback(cb);
            let r = __host_call("data", "get_collection", [id]);
            if "err" in r {
                cb.call(r.err, ());
            } else {
                cb.call((), __collection(r.handle));
            }
        },
        exists_collection: |id, cb| {
            __check_callback(cb);
            __deliver(__host_call("data", "exists_collection", [id]), cb)
        },
        delete_collection: |id, cb| {
            __check_callback(cb);
            __deliver(__host_call("data", "delete_collection", [id]), cb)
        },
        execute_query: |query_string, cb| {
            __check_callback(cb);
            __deliver(__host_call("data", "execute_query", [query_string]), cb)
        },
    }
}

fn __identity_service() {
    #{
        get_identifier: |cb| {
            __check_callback(cb);
            __deliver(__host_call("identity", "get_identifier", []), cb)
        },
        get_name: |cb| {
            __check_callback(cb);
            __deliver(__host_call("identity", "get_name", []), cb)
        },
        get_issuer: |cb| {
            __check_callback(cb);
            __deliver(__host_call("identity", "get_issuer", []), cb)
        },
    }
}

fn __event_service() {
    #{
        emit: |event_data, cb| {
            __check_callback(cb);
            __deliver(__host_call("event", "emit", [event_data]), cb)
        },
    }
}

fn __http_service() {
    #{
        post: |url, data, cb| {
            __check_callback(cb);
            __deliver(__host_call("http", "post", [url, data]), cb)
        },
    }
}

fn __query_service() {
    #{
        query_native: |query_string, cb| {
            __check_callback(cb);
            __deliver(__host_call("query", "query_native", [query_string]), cb)
        },
    }
}

fn __log_service() {
    #{
        debug: |message| { __host_call("logging", "log", ["debug", message]); },
        info: |message| { __host_call("logging", "log", ["info", message]); },
        warn: |message| { __host_call("logging", "log", ["warn", message]); },
        error: |message| { __host_call("logging", "log", ["error", message]); },
        get_level: |cb| {
            __check_callback(cb);
            __deliver(__host_call("logging", "get_level", []), cb)
        },
        set_level: |level, cb| {
            __check_callback(cb);
            __deliver(__host_call("logging", "set_level", [level]), cb)
        },
    }
}

fn __make_context() {
    #{
        data_service: __data_service(),
        identity_service: __identity_service(),
        event_service: __event_service(),
        http_service: __http_service(),
        query_service: __query_service(),
        log_service: __log_service(),
    }
}

fn __dispatch(entry, function_name, parameters) {
    let context = __make_context();
    let complete = |err, value| __host_complete(err, value);
    switch entry {
        "init" => init(context, function_name, parameters, complete),
        "invoke" => invoke(context, function_name, parameters, complete),
        "query" => query(context, function_name, parameters, complete),
        _ => throw "unknown entry point: " + entry,
    }
}
"#;
