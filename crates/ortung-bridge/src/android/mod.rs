// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android location provider via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`, API level 31 or newer (`LocationRequest.Builder`,
// batched `onLocationChanged`).
//
// ## Architecture notes
//
// The platform receiver is `ortung.location.LocationShim` (see
// `java/ortung/location/LocationShim.java`). The host app packages it; we
// load it through the Activity's class loader because `FindClass` on a
// native thread only sees the system class loader. Its native methods are
// registered once and live in `callback.rs`.
//
// `LocationManager` keeps the shim for as long as it likes. Dropping the
// provider calls `removeUpdates` and then `LocationShim.release()`, which
// returns at once; the shim hands the weak count back to Rust as soon as no
// forward is in flight. Dropping the provider from inside a handler is fine.

#![cfg(target_os = "android")]

mod callback;

use std::sync::OnceLock;

use jni::objects::{GlobalRef, JClass, JObject, JValue};
use jni::{JNIEnv, JavaVM};
use tracing::{info, warn};

use ortung_core::config::LocationConfig;
use ortung_core::error::{OrtungError, Result};
use ortung_core::types::{Access, Accuracy};

use crate::handle::EncodedHandle;
use crate::traits::LocationProvider;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Local reference capacity reserved for one provider operation.
const LOCAL_FRAME_CAPACITY: i32 = 32;

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// Obtain the process `JavaVM` from the global Android context.
///
/// `ndk_context::android_context()` returns the `JavaVM*` set by
/// `android_main` or `ANativeActivity_onCreate`.
fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| OrtungError::AndroidEnvironment(format!("failed to obtain JavaVM: {e}")))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Obtain the current Android `Activity` as a [`JObject`].
fn activity() -> Result<JObject<'static>> {
    let ctx = ndk_context::android_context();
    let ptr = ctx.context();
    if ptr.is_null() {
        return Err(OrtungError::AndroidEnvironment(
            "Android context is null: native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity. `JObject` never deletes it.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Run `f` with an attached `JNIEnv` and the Activity inside a local frame.
fn with_activity<R>(f: impl FnOnce(&mut JNIEnv<'_>, &JObject<'_>) -> Result<R>) -> Result<R> {
    let vm = java_vm()?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| OrtungError::AndroidEnvironment(format!("failed to attach JNI thread: {e}")))?;
    let activity = activity()?;

    env.push_local_frame(LOCAL_FRAME_CAPACITY)
        .map_err(|e| jni_err("PushLocalFrame", e))?;
    let result = f(&mut *env, &activity);
    // SAFETY: nothing created inside the frame is used after this point;
    // the shim is promoted to a global reference before returning.
    let _ = unsafe { env.pop_local_frame(&JObject::null()) };

    if result.is_err() {
        // A failed call leaves its Java exception pending; do not let it
        // escape into whatever Java frame runs next on this thread.
        let _ = env.exception_clear();
    }
    result
}

/// Convenience: map any `jni::errors::Error` into `OrtungError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> OrtungError {
    OrtungError::Bridge(format!("{context}: {e}"))
}

/// Like [`jni_err`], but a pending `SecurityException` (missing location
/// permission) becomes `PermissionDenied`.
fn location_call_err(env: &mut JNIEnv<'_>, context: &str, e: jni::errors::Error) -> OrtungError {
    if !matches!(e, jni::errors::Error::JavaException) {
        return jni_err(context, e);
    }
    let Ok(throwable) = env.exception_occurred() else {
        return jni_err(context, e);
    };
    let _ = env.exception_clear();
    match env.is_instance_of(&throwable, "java/lang/SecurityException") {
        Ok(true) => OrtungError::PermissionDenied,
        _ => jni_err(context, e),
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Android implementation of [`LocationProvider`].
pub struct AndroidProvider {
    shim: GlobalRef,
    config: LocationConfig,
}

impl AndroidProvider {
    /// Construct the Java shim around `handle`.
    ///
    /// On success the shim owns the handle's weak count; on failure it is
    /// released here.
    pub fn new(handle: EncodedHandle, config: &LocationConfig) -> Result<Self> {
        let shim = with_activity(|env, activity| {
            let class: &JClass = callback::shim_class(env, activity)?.as_obj().into();
            let (high, low) = handle.words();
            let shim = env
                .new_object(
                    class,
                    "(JJ)V",
                    &[JValue::Long(high as i64), JValue::Long(low as i64)],
                )
                .map_err(|e| jni_err("new LocationShim", e))?;
            let shim = env
                .new_global_ref(shim)
                .map_err(|e| jni_err("NewGlobalRef(shim)", e))?;
            // The Java object now carries the words; it releases them.
            let _ = handle.into_words();
            Ok(shim)
        })?;

        info!(provider = %config.provider, "Android: location shim created");
        Ok(Self {
            shim,
            config: config.clone(),
        })
    }
}

impl LocationProvider for AndroidProvider {
    fn platform_name(&self) -> &str {
        "Android"
    }

    /// Calls `Activity.requestPermissions` with the coarse or fine location
    /// permission. The answer arrives in the Activity's
    /// `onRequestPermissionsResult`, not here.
    fn request_authorization(&self, _access: Access, accuracy: Accuracy) -> Result<()> {
        let request_code = self.config.permission_request_code;
        with_activity(|env, activity| {
            let permission = env
                .new_string(accuracy.android_permission())
                .map_err(|e| jni_err("new_string(permission)", e))?;
            let array = env
                .new_object_array(1, "java/lang/String", &permission)
                .map_err(|e| jni_err("new_object_array(permissions)", e))?;

            info!(permission = accuracy.android_permission(), "Android: requesting permission");
            env.call_method(
                activity,
                "requestPermissions",
                "([Ljava/lang/String;I)V",
                &[JValue::Object(&array), JValue::Int(request_code)],
            )
            .map_err(|e| jni_err("requestPermissions", e))?;
            Ok(())
        })
    }

    /// `LocationManager.getCurrentLocation(provider, null, mainExecutor, shim)`.
    fn update_once(&self) -> Result<()> {
        with_activity(|env, activity| {
            let manager = location_manager(env, activity)?;
            let provider = env
                .new_string(&self.config.provider)
                .map_err(|e| jni_err("new_string(provider)", e))?;
            let executor = main_executor(env, activity)?;

            env.call_method(
                &manager,
                "getCurrentLocation",
                "(Ljava/lang/String;Landroid/os/CancellationSignal;Ljava/util/concurrent/Executor;\
                 Ljava/util/function/Consumer;)V",
                &[
                    JValue::Object(&provider),
                    JValue::Object(&JObject::null()),
                    JValue::Object(&executor),
                    JValue::Object(self.shim.as_obj()),
                ],
            )
            .map_err(|e| location_call_err(env, "getCurrentLocation", e))?;
            Ok(())
        })
    }

    /// `LocationManager.requestLocationUpdates(provider, request, mainExecutor, shim)`.
    fn start_updates(&self) -> Result<()> {
        with_activity(|env, activity| {
            let manager = location_manager(env, activity)?;
            let provider = env
                .new_string(&self.config.provider)
                .map_err(|e| jni_err("new_string(provider)", e))?;
            let request = location_request(env, &self.config)?;
            let executor = main_executor(env, activity)?;

            env.call_method(
                &manager,
                "requestLocationUpdates",
                "(Ljava/lang/String;Landroid/location/LocationRequest;Ljava/util/concurrent/\
                 Executor;Landroid/location/LocationListener;)V",
                &[
                    JValue::Object(&provider),
                    JValue::Object(&request),
                    JValue::Object(&executor),
                    JValue::Object(self.shim.as_obj()),
                ],
            )
            .map_err(|e| location_call_err(env, "requestLocationUpdates", e))?;

            info!(
                provider = %self.config.provider,
                interval_ms = self.config.update_interval_ms,
                "Android: location updates requested"
            );
            Ok(())
        })
    }

    /// `LocationManager.removeUpdates(shim)`. The listener is guaranteed not
    /// to receive invocations that happen-after this call.
    fn stop_updates(&self) -> Result<()> {
        with_activity(|env, activity| {
            let manager = location_manager(env, activity)?;
            env.call_method(
                &manager,
                "removeUpdates",
                "(Landroid/location/LocationListener;)V",
                &[JValue::Object(self.shim.as_obj())],
            )
            .map_err(|e| jni_err("removeUpdates", e))?;
            Ok(())
        })
    }
}

impl Drop for AndroidProvider {
    fn drop(&mut self) {
        if let Err(e) = self.stop_updates() {
            warn!("Android: removeUpdates on drop failed: {e}");
        }
        // A pending getCurrentLocation may still call `accept`; after
        // `release` the shim ignores it.
        let released = with_activity(|env, _| {
            env.call_method(self.shim.as_obj(), "release", "()V", &[])
                .map_err(|e| jni_err("LocationShim.release", e))?;
            Ok(())
        });
        if let Err(e) = released {
            warn!("Android: shim release failed, handle leaked: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `context.getSystemService("location")`.
fn location_manager<'a>(env: &mut JNIEnv<'a>, context: &JObject<'_>) -> Result<JObject<'a>> {
    let service_name = env
        .new_string("location")
        .map_err(|e| jni_err("new_string(location)", e))?;

    env.call_method(
        context,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&service_name)],
    )
    .map_err(|e| jni_err("getSystemService", e))?
    .l()
    .map_err(|e| jni_err("getSystemService->l", e))
}

/// `context.getMainExecutor()`; callbacks then arrive on the main thread.
fn main_executor<'a>(env: &mut JNIEnv<'a>, context: &JObject<'_>) -> Result<JObject<'a>> {
    env.call_method(
        context,
        "getMainExecutor",
        "()Ljava/util/concurrent/Executor;",
        &[],
    )
    .map_err(|e| jni_err("getMainExecutor", e))?
    .l()
    .map_err(|e| jni_err("getMainExecutor->l", e))
}

/// `new LocationRequest.Builder(intervalMillis).build()`.
fn location_request<'a>(env: &mut JNIEnv<'a>, config: &LocationConfig) -> Result<JObject<'a>> {
    let interval_ms = i64::try_from(config.update_interval_ms).unwrap_or(i64::MAX);
    let builder = env
        .new_object(
            "android/location/LocationRequest$Builder",
            "(J)V",
            &[JValue::Long(interval_ms)],
        )
        .map_err(|e| jni_err("new LocationRequest.Builder", e))?;

    env.call_method(
        &builder,
        "build",
        "()Landroid/location/LocationRequest;",
        &[],
    )
    .map_err(|e| jni_err("LocationRequest.Builder.build", e))?
    .l()
    .map_err(|e| jni_err("build->l", e))
}
