// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native side of `ortung.location.LocationShim`.
//
// Every `deliver*` method the shim declares lands in one of the functions
// below. They rebuild the handle from its words without taking ownership,
// wrap the raw Java arguments in a `Delivery`, and hand it to the
// dispatcher. Nothing here may unwind or leave a Java exception pending:
// the caller is `LocationManager`'s executor.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jint, jlong};
use jni::{JNIEnv, NativeMethod};
use tracing::error;

use ortung_core::error::Result;
use ortung_core::types::{Coordinates, Failure, FailureKind, Location};

use super::jni_err;
use crate::dispatch::dispatch;
use crate::handle::EncodedHandle;
use crate::normalize::Delivery;

/// Binary name passed to `ClassLoader.loadClass`.
const SHIM_CLASS_NAME: &str = "ortung.location.LocationShim";

// NOTE: these signatures must match the `native` declarations in
// LocationShim.java and the Rust functions below.
const SINGLE_SIGNATURE: &str = "(JJLandroid/location/Location;)V";
const BATCH_SIGNATURE: &str = "(JJLjava/util/List;)V";
const ERROR_SIGNATURE: &str = "(JJILjava/lang/String;)V";
const PROVIDER_DISABLED_SIGNATURE: &str = "(JJLjava/lang/String;)V";
const RELEASE_SIGNATURE: &str = "(JJ)V";

static SHIM_CLASS: OnceLock<GlobalRef> = OnceLock::new();

/// Load `LocationShim` and register its native methods, once per process.
pub(super) fn shim_class(
    env: &mut JNIEnv<'_>,
    activity: &JObject<'_>,
) -> Result<&'static GlobalRef> {
    if let Some(class) = SHIM_CLASS.get() {
        return Ok(class);
    }
    let class = load_shim_class(env, activity)?;
    register_natives(env, &class)?;
    let global = env
        .new_global_ref(class)
        .map_err(|e| jni_err("NewGlobalRef(LocationShim class)", e))?;
    Ok(SHIM_CLASS.get_or_init(|| global))
}

fn load_shim_class<'a>(env: &mut JNIEnv<'a>, activity: &JObject<'_>) -> Result<JClass<'a>> {
    let loader = env
        .call_method(activity, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .map_err(|e| jni_err("getClassLoader", e))?
        .l()
        .map_err(|e| jni_err("getClassLoader->l", e))?;
    let name = env
        .new_string(SHIM_CLASS_NAME)
        .map_err(|e| jni_err("new_string(shim class)", e))?;

    let class = env
        .call_method(
            &loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&name)],
        )
        .map_err(|e| jni_err("loadClass(ortung.location.LocationShim)", e))?
        .l()
        .map_err(|e| jni_err("loadClass->l", e))?;
    Ok(JClass::from(class))
}

fn register_natives(env: &mut JNIEnv<'_>, class: &JClass<'_>) -> Result<()> {
    let methods = [
        native("deliverSingle", SINGLE_SIGNATURE, deliver_single as *mut c_void),
        native("deliverUpdate", SINGLE_SIGNATURE, deliver_update as *mut c_void),
        native("deliverBatch", BATCH_SIGNATURE, deliver_batch as *mut c_void),
        native("deliverError", ERROR_SIGNATURE, deliver_error as *mut c_void),
        native(
            "deliverProviderDisabled",
            PROVIDER_DISABLED_SIGNATURE,
            deliver_provider_disabled as *mut c_void,
        ),
        native("releaseHandle", RELEASE_SIGNATURE, release_handle as *mut c_void),
    ];
    env.register_native_methods(class, &methods)
        .map_err(|e| jni_err("RegisterNatives(LocationShim)", e))
}

fn native(name: &str, sig: &str, fn_ptr: *mut c_void) -> NativeMethod {
    NativeMethod {
        name: name.into(),
        sig: sig.into(),
        fn_ptr,
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// View the shim's words as a handle without taking its weak count.
fn borrowed(high: jlong, low: jlong) -> ManuallyDrop<EncodedHandle> {
    // SAFETY: the shim was constructed with words whose ownership passed to
    // it (`into_words`). A forward counts itself in flight before calling
    // here, and the shim frees the words only once none are.
    ManuallyDrop::new(unsafe { EncodedHandle::from_words(high as u64, low as u64) })
}

/// Run one entry point, keeping panics and Java exceptions on this side.
fn boundary(env: &mut JNIEnv<'_>, entry: &'static str, body: impl FnOnce(&mut JNIEnv<'_>)) {
    if catch_unwind(AssertUnwindSafe(|| body(env))).is_err() {
        error!(entry, "panic in location callback contained");
    }
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
}

extern "system" fn deliver_single<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    high: jlong,
    low: jlong,
    location: JObject<'local>,
) {
    boundary(&mut env, "deliverSingle", |env| {
        let handle = borrowed(high, low);
        let delivery = if location.is_null() {
            // getCurrentLocation completes with null when no fix is available.
            Delivery::Error(Failure::new(FailureKind::NoFix, "platform returned no location"))
        } else {
            Delivery::Single(location)
        };
        dispatch(&handle, delivery, |raw| extract_location(env, &raw));
    });
}

extern "system" fn deliver_update<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    high: jlong,
    low: jlong,
    location: JObject<'local>,
) {
    boundary(&mut env, "deliverUpdate", |env| {
        let handle = borrowed(high, low);
        dispatch(&handle, Delivery::Update(location), |raw| extract_location(env, &raw));
    });
}

extern "system" fn deliver_batch<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    high: jlong,
    low: jlong,
    locations: JObject<'local>,
) {
    boundary(&mut env, "deliverBatch", |env| {
        let handle = borrowed(high, low);
        let delivery = match list_elements(env, &locations) {
            Ok(elements) => Delivery::Batch(elements),
            Err(e) => {
                let _ = env.exception_clear();
                Delivery::Error(Failure::new(
                    FailureKind::Extraction,
                    format!("reading location list: {e}"),
                ))
            }
        };
        dispatch(&handle, delivery, |raw| extract_location(env, &raw));
    });
}

extern "system" fn deliver_error<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    high: jlong,
    low: jlong,
    code: jint,
    message: JString<'local>,
) {
    boundary(&mut env, "deliverError", |env| {
        let handle = borrowed(high, low);
        let failure = Failure::platform(i64::from(code), java_string(env, &message));
        dispatch(&handle, Delivery::<JObject<'_>>::Error(failure), |raw| {
            extract_location(env, &raw)
        });
    });
}

extern "system" fn deliver_provider_disabled<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    high: jlong,
    low: jlong,
    provider: JString<'local>,
) {
    boundary(&mut env, "deliverProviderDisabled", |env| {
        let handle = borrowed(high, low);
        let provider = java_string(env, &provider);
        let failure = Failure::new(
            FailureKind::ProviderDisabled,
            format!("location provider '{provider}' disabled"),
        );
        dispatch(&handle, Delivery::<JObject<'_>>::Error(failure), |raw| {
            extract_location(env, &raw)
        });
    });
}

extern "system" fn release_handle<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
    high: jlong,
    low: jlong,
) {
    // SAFETY: called exactly once per shim, when it is released and no
    // forward is in flight, with the words it was constructed with.
    drop(unsafe { EncodedHandle::from_words(high as u64, low as u64) });
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Fields read from `android.location.Location`.
struct RawFix {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    bearing: Option<f64>,
    speed: Option<f64>,
    accuracy: Option<f64>,
    time_ms: i64,
}

fn extract_location(
    env: &mut JNIEnv<'_>,
    location: &JObject<'_>,
) -> std::result::Result<Location, Failure> {
    let raw = read_fix(env, location).map_err(|e| {
        let _ = env.exception_clear();
        Failure::new(FailureKind::Extraction, e.to_string())
    })?;

    let timestamp = DateTime::<Utc>::from_timestamp_millis(raw.time_ms).ok_or_else(|| {
        Failure::new(
            FailureKind::Extraction,
            format!("fix time {} ms out of range", raw.time_ms),
        )
    })?;

    Ok(Location {
        coordinates: Coordinates::new(raw.latitude, raw.longitude),
        altitude: raw.altitude,
        bearing: raw.bearing,
        speed: raw.speed,
        horizontal_accuracy: raw.accuracy,
        timestamp,
    })
}

fn read_fix(env: &mut JNIEnv<'_>, location: &JObject<'_>) -> jni::errors::Result<RawFix> {
    let latitude = env.call_method(location, "getLatitude", "()D", &[])?.d()?;
    let longitude = env.call_method(location, "getLongitude", "()D", &[])?.d()?;

    let altitude = if flag(env, location, "hasAltitude")? {
        Some(env.call_method(location, "getAltitude", "()D", &[])?.d()?)
    } else {
        None
    };
    let bearing = optional_float(env, location, "hasBearing", "getBearing")?;
    let speed = optional_float(env, location, "hasSpeed", "getSpeed")?;
    let accuracy = optional_float(env, location, "hasAccuracy", "getAccuracy")?;
    let time_ms = env.call_method(location, "getTime", "()J", &[])?.j()?;

    Ok(RawFix {
        latitude,
        longitude,
        altitude,
        bearing,
        speed,
        accuracy,
        time_ms,
    })
}

fn flag(env: &mut JNIEnv<'_>, location: &JObject<'_>, method: &str) -> jni::errors::Result<bool> {
    env.call_method(location, method, "()Z", &[])?.z()
}

fn optional_float(
    env: &mut JNIEnv<'_>,
    location: &JObject<'_>,
    has: &str,
    get: &str,
) -> jni::errors::Result<Option<f64>> {
    if flag(env, location, has)? {
        Ok(Some(f64::from(env.call_method(location, get, "()F", &[])?.f()?)))
    } else {
        Ok(None)
    }
}

/// `java.util.List` elements in list order.
fn list_elements<'a>(
    env: &mut JNIEnv<'a>,
    list: &JObject<'_>,
) -> jni::errors::Result<Vec<JObject<'a>>> {
    if list.is_null() {
        return Ok(Vec::new());
    }
    let size = env.call_method(list, "size", "()I", &[])?.i()?;
    let mut elements = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    for index in 0..size {
        let element = env
            .call_method(list, "get", "(I)Ljava/lang/Object;", &[JValue::Int(index)])?
            .l()?;
        elements.push(element);
    }
    Ok(elements)
}

fn java_string(env: &mut JNIEnv<'_>, value: &JString<'_>) -> String {
    if value.is_null() {
        return String::new();
    }
    match env.get_string(value) {
        Ok(s) => s.into(),
        Err(_) => {
            let _ = env.exception_clear();
            String::new()
        }
    }
}
